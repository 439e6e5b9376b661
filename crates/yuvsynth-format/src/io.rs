//! I/O 抽象层.
//!
//! 封装器/解封装器只面向 [`IoContext`], 不关心数据来自文件还是内存.
//! 内存后端用于把已编码的流整体读入内存后再解码.

use std::fs::File;
use std::io::{self, BufWriter, Read, Seek, Write};
use std::path::Path;

use yuvsynth_core::{SynthError, SynthResult};

/// I/O 后端 trait
pub trait IoBackend: Send {
    /// 读取数据, 返回实际读取的字节数 (0 表示末尾)
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64>;
    fn position(&mut self) -> io::Result<u64>;
    /// 总大小 (如果可知)
    fn size(&self) -> Option<u64>;
    fn is_seekable(&self) -> bool;
    /// 取出内存中的数据, 只有内存后端支持
    fn into_data(self: Box<Self>) -> Option<Vec<u8>> {
        None
    }
}

/// 读缓冲区大小
const READ_BUFFER_SIZE: usize = 32 * 1024;

/// 读方向的缓冲区: `data[start..end]` 是尚未消耗的数据
struct ReadBuffer {
    data: Box<[u8]>,
    start: usize,
    end: usize,
}

impl ReadBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            start: 0,
            end: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }

    fn available(&self) -> &[u8] {
        &self.data[self.start..self.end]
    }

    fn len(&self) -> usize {
        self.end - self.start
    }

    fn is_empty(&self) -> bool {
        self.start == self.end
    }

    fn consume(&mut self, n: usize) {
        self.start = (self.start + n).min(self.end);
    }

    fn clear(&mut self) {
        self.start = 0;
        self.end = 0;
    }

    /// 从后端重新填满, 返回读入的字节数
    fn refill(&mut self, backend: &mut dyn IoBackend) -> io::Result<usize> {
        self.clear();
        self.end = backend.read(&mut self.data)?;
        Ok(self.end)
    }

    /// 复制尽可能多的数据到 `out`, 返回复制的字节数
    fn copy_to(&mut self, out: &mut [u8]) -> usize {
        let n = self.len().min(out.len());
        out[..n].copy_from_slice(&self.data[self.start..self.start + n]);
        self.start += n;
        n
    }
}

/// I/O 上下文
pub struct IoContext {
    inner: Box<dyn IoBackend>,
    buffer: ReadBuffer,
}

impl IoContext {
    /// 从 I/O 后端创建上下文
    pub fn new(backend: Box<dyn IoBackend>) -> Self {
        Self {
            inner: backend,
            buffer: ReadBuffer::new(READ_BUFFER_SIZE),
        }
    }

    /// 以只读方式打开文件
    pub fn open_read(path: impl AsRef<Path>) -> SynthResult<Self> {
        let file = File::open(path)?;
        Ok(Self::new(Box::new(FileBackend::reader(file))))
    }

    /// 以写入方式打开文件 (已存在则截断)
    pub fn open_write(path: impl AsRef<Path>) -> SynthResult<Self> {
        let file = File::create(path)?;
        Ok(Self::new(Box::new(FileBackend::writer(file))))
    }

    /// 以内存数据作为输入
    pub fn from_memory(data: Vec<u8>) -> Self {
        Self::new(Box::new(MemoryBackend::from_data(data)))
    }

    /// 以空内存缓冲区作为输出
    pub fn memory_writer() -> Self {
        Self::new(Box::new(MemoryBackend::new()))
    }

    /// 尽可能读满 `buf`, 返回实际读取的字节数
    ///
    /// 返回值小于 `buf.len()` 说明已到达末尾.
    pub fn read_full(&mut self, buf: &mut [u8]) -> SynthResult<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            if self.buffer.is_empty() {
                // 大块读取 (整帧) 直接读入目标, 不经过缓冲区
                if buf.len() - filled >= self.buffer.capacity() {
                    let n = self.inner.read(&mut buf[filled..])?;
                    if n == 0 {
                        break;
                    }
                    filled += n;
                    continue;
                }
                if self.buffer.refill(self.inner.as_mut())? == 0 {
                    break;
                }
            }
            filled += self.buffer.copy_to(&mut buf[filled..]);
        }
        Ok(filled)
    }

    /// 读取指定字节数, 数据不足时返回 `Eof`
    pub fn read_exact(&mut self, buf: &mut [u8]) -> SynthResult<()> {
        if self.read_full(buf)? < buf.len() {
            return Err(SynthError::Eof);
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> SynthResult<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    pub fn read_bytes(&mut self, count: usize) -> SynthResult<Vec<u8>> {
        let mut buf = vec![0u8; count];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// 读取一行 (以 `\n` 结尾, 返回值不含换行符)
    ///
    /// 行长超过 `max_len` 或在换行符之前结束为 `InvalidData`; 在行首遇到末尾为 `Eof`.
    pub fn read_line(&mut self, max_len: usize) -> SynthResult<Vec<u8>> {
        let mut line = Vec::new();
        loop {
            if self.buffer.is_empty() && self.buffer.refill(self.inner.as_mut())? == 0 {
                return Err(if line.is_empty() {
                    SynthError::Eof
                } else {
                    SynthError::InvalidData("行在换行符之前结束".into())
                });
            }

            let chunk = self.buffer.available();
            let newline = chunk.iter().position(|&b| b == b'\n');
            let take = newline.unwrap_or(chunk.len());
            if line.len() + take > max_len {
                return Err(SynthError::InvalidData(format!(
                    "行长度超过 {} 字节",
                    max_len
                )));
            }
            line.extend_from_slice(&chunk[..take]);

            match newline {
                Some(_) => {
                    self.buffer.consume(take + 1);
                    return Ok(line);
                }
                None => self.buffer.consume(take),
            }
        }
    }

    /// 读取剩余全部数据
    pub fn read_to_end(&mut self) -> SynthResult<Vec<u8>> {
        let mut out = Vec::with_capacity(self.remaining_hint());
        out.extend_from_slice(self.buffer.available());
        self.buffer.clear();

        let mut chunk = vec![0u8; READ_BUFFER_SIZE];
        loop {
            let n = self.inner.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }
        Ok(out)
    }

    fn remaining_hint(&mut self) -> usize {
        match (self.inner.size(), self.position()) {
            (Some(size), Ok(pos)) => size.saturating_sub(pos) as usize,
            _ => self.buffer.len(),
        }
    }

    pub fn write_all(&mut self, buf: &[u8]) -> SynthResult<()> {
        self.inner.write_all(buf)?;
        Ok(())
    }

    pub fn flush(&mut self) -> SynthResult<()> {
        self.inner.flush()?;
        Ok(())
    }

    /// 定位, 同时丢弃读缓冲区
    pub fn seek(&mut self, pos: io::SeekFrom) -> SynthResult<u64> {
        // 相对定位以逻辑位置为准, 先换算成绝对位置
        let pos = match pos {
            io::SeekFrom::Current(offset) => {
                let logical = self.position()? as i64 + offset;
                let logical = u64::try_from(logical).map_err(|_| {
                    SynthError::InvalidArgument(format!("seek 位置不能为负: {}", logical))
                })?;
                io::SeekFrom::Start(logical)
            }
            other => other,
        };
        self.buffer.clear();
        Ok(self.inner.seek(pos)?)
    }

    /// 逻辑位置 (扣除读缓冲区中尚未消耗的数据)
    pub fn position(&mut self) -> SynthResult<u64> {
        let raw = self.inner.position()?;
        Ok(raw - self.buffer.len() as u64)
    }

    pub fn is_seekable(&self) -> bool {
        self.inner.is_seekable()
    }

    pub fn size(&self) -> Option<u64> {
        self.inner.size()
    }

    /// 消耗上下文, 取出内存后端中的数据
    ///
    /// 文件后端返回 `Unsupported`.
    pub fn into_data(self) -> SynthResult<Vec<u8>> {
        self.inner
            .into_data()
            .ok_or_else(|| SynthError::Unsupported("只有内存后端可以取出数据".into()))
    }
}

/// 让基于 `std::io` 的库 (如 `y4m`) 直接读写上下文, 读取同样经过读缓冲区
impl Read for IoContext {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.buffer.is_empty() {
            if buf.len() >= self.buffer.capacity() {
                return self.inner.read(buf);
            }
            if self.buffer.refill(self.inner.as_mut())? == 0 {
                return Ok(0);
            }
        }
        Ok(self.buffer.copy_to(buf))
    }
}

impl Write for IoContext {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// 文件后端: 读文件直接读, 写文件经过 `BufWriter`
enum FileBackend {
    Reader { file: File, size: Option<u64> },
    Writer(BufWriter<File>),
}

impl FileBackend {
    fn reader(file: File) -> Self {
        let size = file.metadata().ok().map(|m| m.len());
        Self::Reader { file, size }
    }

    fn writer(file: File) -> Self {
        Self::Writer(BufWriter::new(file))
    }
}

fn wrong_direction(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, msg.to_string())
}

impl IoBackend for FileBackend {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Reader { file, .. } => file.read(buf),
            Self::Writer(_) => Err(wrong_direction("以写入方式打开的文件不可读")),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            Self::Reader { .. } => Err(wrong_direction("以只读方式打开的文件不可写")),
            Self::Writer(writer) => writer.write_all(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Reader { .. } => Ok(()),
            Self::Writer(writer) => writer.flush(),
        }
    }

    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        match self {
            Self::Reader { file, .. } => file.seek(pos),
            Self::Writer(writer) => writer.seek(pos),
        }
    }

    fn position(&mut self) -> io::Result<u64> {
        match self {
            Self::Reader { file, .. } => file.stream_position(),
            Self::Writer(writer) => writer.stream_position(),
        }
    }

    fn size(&self) -> Option<u64> {
        match self {
            Self::Reader { size, .. } => *size,
            Self::Writer(_) => None,
        }
    }

    fn is_seekable(&self) -> bool {
        true
    }
}

/// 内存缓冲区 I/O 后端
///
/// 读取时每次复制 `min(请求长度, 剩余长度)` 字节并推进游标,
/// 剩余为 0 时返回 0 (末尾).
#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: Vec<u8>,
    cursor: usize,
}

impl MemoryBackend {
    /// 从已有数据创建 (用于读取)
    pub fn from_data(data: Vec<u8>) -> Self {
        Self { data, cursor: 0 }
    }

    /// 创建空缓冲区 (用于写入)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// 尚未读取的字节数
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.cursor)
    }
}

impl IoBackend for MemoryBackend {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // seek 允许越过末尾, 此时读到 0 字节
        let start = self.cursor.min(self.data.len());
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.cursor += n;
        Ok(n)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let end = self.cursor + buf.len();
        if end > self.data.len() {
            // seek 越过末尾时中间补零
            self.data.resize(end, 0);
        }
        self.data[self.cursor..end].copy_from_slice(buf);
        self.cursor = end;
        Ok(())
    }

    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let target = match pos {
            io::SeekFrom::Start(offset) => Some(offset),
            io::SeekFrom::End(offset) => (self.data.len() as u64).checked_add_signed(offset),
            io::SeekFrom::Current(offset) => (self.cursor as u64).checked_add_signed(offset),
        };
        let target = target
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "seek 位置不能为负"))?;
        self.cursor = target as usize;
        Ok(target)
    }

    fn position(&mut self) -> io::Result<u64> {
        Ok(self.cursor as u64)
    }

    fn size(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn into_data(self: Box<Self>) -> Option<Vec<u8>> {
        Some(self.data)
    }
}
