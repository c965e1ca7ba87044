//! # channel 模块说明
//!
//! ## 角色定位（Why）
//! - [`ByteChannel`] 是所有处理器共享的底层字节通道：一块可增长缓冲加一个可任意定位的绝对游标；
//! - 集合链需要“先占位、后回填”计数，数组链需要按固定宽度写秩与维度，因此通道必须支持
//!   覆盖写与回退定位，而不仅是追加。
//!
//! ## 线格式（What）
//! - 定宽整数与浮点数一律小端序；
//! - 字节序列：`i32` 长度前缀 + 原始字节；
//! - 字符串：7-bit 变长整数表示 UTF-8 字节长度 + UTF-8 负载；
//! - 读取越过 [`ByteChannel::available`] 统一报告 [`CodecError::UnexpectedEof`]。
//!
//! ## 设计权衡（Trade-offs）
//! - 底层使用 `bytes::BytesMut`，与 spark 工作区缓冲约定一致，编码完成后可零拷贝冻结为 `Bytes`；
//! - 通道不是线程安全的，每次调用独占一个实例。

use bytes::{Bytes, BytesMut};

use crate::error::{CodecError, Result};

mod sealed {
    pub trait Sealed {}
}

/// 通道可直接读写的定宽原语。
///
/// # 契约说明（What）
/// - `WIDTH` 为线格式中的字节宽度，`put` 写入的切片长度恰为 `WIDTH`；
/// - `get` 只会收到长度为 `WIDTH` 的切片，取值域受限的类型（如 `bool`）需自行校验。
pub trait Primitive: Copy + Send + Sync + 'static + sealed::Sealed {
    /// 线格式宽度。
    const WIDTH: usize;

    /// 以小端序写入 `out`。
    fn put(self, out: &mut [u8]);

    /// 从恰为 `WIDTH` 字节的切片还原值。
    fn get(src: &[u8]) -> Result<Self>;
}

macro_rules! impl_le_primitive {
    ($($ty:ty),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl Primitive for $ty {
                const WIDTH: usize = core::mem::size_of::<$ty>();

                fn put(self, out: &mut [u8]) {
                    out.copy_from_slice(&self.to_le_bytes());
                }

                fn get(src: &[u8]) -> Result<Self> {
                    let mut raw = [0u8; core::mem::size_of::<$ty>()];
                    raw.copy_from_slice(src);
                    Ok(<$ty>::from_le_bytes(raw))
                }
            }
        )*
    };
}

impl_le_primitive!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

impl sealed::Sealed for bool {}

impl Primitive for bool {
    const WIDTH: usize = 1;

    fn put(self, out: &mut [u8]) {
        out[0] = u8::from(self);
    }

    fn get(src: &[u8]) -> Result<Self> {
        match src[0] {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::InvalidValue {
                what: "bool",
                value: i64::from(other),
            }),
        }
    }
}

/// 7-bit 变长整数最多占用的字节数（覆盖 `u32`）。
const MAX_VARINT_BYTES: usize = 5;

/// 可增长字节缓冲 + 绝对游标。
///
/// # 教案式说明
/// - **意图 (Why)**：为处理器提供“既能追加、也能回头补写”的统一读写面；
/// - **逻辑 (How)**：写操作从游标处开始覆盖，越过末尾时自动扩容；读操作只消费
///   `[position, len)` 区间内的字节；
/// - **契约 (What)**：`position() <= len()` 恒成立；任何读失败都不会推进游标。
#[derive(Debug, Default, Clone)]
pub struct ByteChannel {
    buf: BytesMut,
    pos: usize,
}

impl ByteChannel {
    /// 创建空通道。
    pub fn new() -> Self {
        Self::default()
    }

    /// 预分配容量的空通道。
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            pos: 0,
        }
    }

    /// 以现有字节构建只读起点，游标位于 0。
    pub fn from_slice(data: &[u8]) -> Self {
        Self {
            buf: BytesMut::from(data),
            pos: 0,
        }
    }

    /// 当前绝对游标。
    pub fn position(&self) -> usize {
        self.pos
    }

    /// 移动游标；允许定位到末尾，越界返回 [`CodecError::InvalidSeek`]。
    pub fn set_position(&mut self, position: usize) -> Result<()> {
        if position > self.buf.len() {
            return Err(CodecError::InvalidSeek {
                position,
                length: self.buf.len(),
            });
        }
        self.pos = position;
        Ok(())
    }

    /// 游标回到起点；起点总在缓冲范围内，因此不会失败。
    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    /// 缓冲总长度。
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// 缓冲是否为空。
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// 游标之后尚未读取的字节数。
    pub fn available(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// 整个缓冲的只读视图。
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// 冻结为不可变 `Bytes`。
    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }

    /// 拷贝出整个缓冲。
    pub fn to_vec(&self) -> Vec<u8> {
        self.buf.to_vec()
    }

    fn put_raw(&mut self, data: &[u8]) {
        let end = self.pos + data.len();
        if end > self.buf.len() {
            self.buf.resize(end, 0);
        }
        self.buf[self.pos..end].copy_from_slice(data);
        self.pos = end;
    }

    fn take_raw(&mut self, requested: usize) -> Result<&[u8]> {
        let available = self.available();
        if requested > available {
            return Err(CodecError::UnexpectedEof {
                requested,
                available,
            });
        }
        let start = self.pos;
        self.pos += requested;
        Ok(&self.buf[start..self.pos])
    }

    /// 写入一个定宽原语。
    pub fn write<P: Primitive>(&mut self, value: P) {
        let mut raw = [0u8; 8];
        value.put(&mut raw[..P::WIDTH]);
        self.put_raw(&raw[..P::WIDTH]);
    }

    /// 读取一个定宽原语。
    pub fn read<P: Primitive>(&mut self) -> Result<P> {
        let start = self.pos;
        let raw = self.take_raw(P::WIDTH)?;
        P::get(raw).inspect_err(|_| self.pos = start)
    }

    /// 写入 `i32` 长度前缀的字节序列。
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        let len = length_prefix("byte sequence length", data.len())?;
        self.write::<i32>(len);
        self.put_raw(data);
        Ok(())
    }

    /// 读取 `i32` 长度前缀的字节序列。
    pub fn read_bytes(&mut self) -> Result<Bytes> {
        let start = self.pos;
        let result = self.read_bytes_inner();
        if result.is_err() {
            self.pos = start;
        }
        result
    }

    fn read_bytes_inner(&mut self) -> Result<Bytes> {
        let len = self.read::<i32>()?;
        let len = usize::try_from(len).map_err(|_| CodecError::InvalidLength {
            what: "byte sequence length",
            value: i64::from(len),
        })?;
        Ok(Bytes::copy_from_slice(self.take_raw(len)?))
    }

    /// 写入 7-bit 变长长度前缀的 UTF-8 字符串。
    pub fn write_str(&mut self, value: &str) -> Result<()> {
        let len = length_prefix("string length", value.len())?;
        let mut remaining = len as u32;
        while remaining >= 0x80 {
            self.write::<u8>((remaining as u8) | 0x80);
            remaining >>= 7;
        }
        self.write::<u8>(remaining as u8);
        self.put_raw(value.as_bytes());
        Ok(())
    }

    /// 读取 7-bit 变长长度前缀的 UTF-8 字符串。
    pub fn read_string(&mut self) -> Result<String> {
        let start = self.pos;
        let result = self.read_string_inner();
        if result.is_err() {
            self.pos = start;
        }
        result
    }

    fn read_string_inner(&mut self) -> Result<String> {
        let mut len: u64 = 0;
        let mut shift = 0u32;
        for index in 0..MAX_VARINT_BYTES {
            let byte = self.read::<u8>()?;
            len |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            if index + 1 == MAX_VARINT_BYTES {
                return Err(CodecError::InvalidLength {
                    what: "string length",
                    value: len as i64,
                });
            }
            shift += 7;
        }
        if len > i32::MAX as u64 {
            return Err(CodecError::InvalidLength {
                what: "string length",
                value: len as i64,
            });
        }
        let raw = self.take_raw(len as usize)?;
        let text = core::str::from_utf8(raw).map_err(|err| CodecError::InvalidUtf8 {
            valid_up_to: err.valid_up_to(),
        })?;
        Ok(text.to_owned())
    }

    /// 记住当前位置并前进 `n` 字节，越过末尾的部分以零填充。
    ///
    /// 返回占位区间的起点，供 [`backpatch_length_at`](Self::backpatch_length_at) 或
    /// [`patch_i32_at`](Self::patch_i32_at) 回填。
    pub fn reserve_and_seek(&mut self, n: usize) -> usize {
        let start = self.pos;
        let end = start + n;
        if end > self.buf.len() {
            self.buf.resize(end, 0);
        }
        self.pos = end;
        start
    }

    /// 在 `position` 处写入“从该 4 字节字段之后到缓冲末尾”的距离，并把游标移到末尾。
    pub fn backpatch_length_at(&mut self, position: usize) -> Result<()> {
        let length = self.buf.len();
        let field_end = position
            .checked_add(4)
            .filter(|end| *end <= length)
            .ok_or(CodecError::InvalidSeek { position, length })?;
        let distance = u32::try_from(length - field_end).map_err(|_| CodecError::InvalidLength {
            what: "backpatched length",
            value: (length - field_end) as i64,
        })?;
        self.buf[position..field_end].copy_from_slice(&distance.to_le_bytes());
        self.pos = length;
        Ok(())
    }

    /// 在 `position` 处覆盖写入一个 `i32`，完成后游标回到调用前的位置。
    pub fn patch_i32_at(&mut self, position: usize, value: i32) -> Result<()> {
        let length = self.buf.len();
        let field_end = position
            .checked_add(4)
            .filter(|end| *end <= length)
            .ok_or(CodecError::InvalidSeek { position, length })?;
        self.buf[position..field_end].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }
}

impl From<Bytes> for ByteChannel {
    fn from(value: Bytes) -> Self {
        Self {
            buf: BytesMut::from(&value[..]),
            pos: 0,
        }
    }
}

impl From<Vec<u8>> for ByteChannel {
    fn from(value: Vec<u8>) -> Self {
        Self {
            buf: BytesMut::from(&value[..]),
            pos: 0,
        }
    }
}

fn length_prefix(what: &'static str, len: usize) -> Result<i32> {
    i32::try_from(len).map_err(|_| CodecError::InvalidLength {
        what,
        value: i64::try_from(len).unwrap_or(i64::MAX),
    })
}
