//! 数组链。
//!
//! # 线格式（What）
//! - `i32` 秩（≥ 1）；
//! - 秩为 1：`i32` 长度；秩大于 1：依次写出每一维的 `i32` 大小；
//! - 随后按行优先顺序（最后一个下标变化最快）写出全部元素。
//!
//! 解码端先读出秩与形状，校验后分配存储，再按同样的顺序填充。数组的数组（交错数组）
//! 的每个内层数组都是一个独立元素，带有自己的秩与形状。

use std::borrow::Cow;
use std::marker::PhantomData;
use std::sync::Arc;

use super::{capacity_hint, inner_part};
use crate::error::{CodecError, Result};
use crate::handler::{ErasedHandler, Handler};
use crate::ndarray::NdArray;
use crate::session::{DecodeSession, EncodeSession};
use crate::wire::Wire;

/// 解码端接受的最大秩。
pub const MAX_RANK: usize = 32;

/// 可作为数组编解码的值。
///
/// # 契约说明（What）
/// - `dims` 的长度即秩，各维大小之积等于 `elements().len()`；
/// - `elements` 按行优先顺序给出全部元素；
/// - `from_parts` 收到的形状与元素数量已由链校验一致，实现者只需检查自身额外约束；
/// - `FIXED_RANK` 为 `Some(r)` 时，解码端拒绝其他秩。
pub trait ArrayValue: Send + Sync + 'static + Sized {
    type Element: Wire;

    const FIXED_RANK: Option<usize> = None;

    fn dims(&self) -> Cow<'_, [usize]>;

    fn elements(&self) -> &[Self::Element];

    fn from_parts(dims: Vec<usize>, elements: Vec<Self::Element>) -> Result<Self>;
}

impl<T: Wire> ArrayValue for Box<[T]> {
    type Element = T;

    const FIXED_RANK: Option<usize> = Some(1);

    fn dims(&self) -> Cow<'_, [usize]> {
        Cow::Owned(vec![self.len()])
    }

    fn elements(&self) -> &[T] {
        self
    }

    fn from_parts(_dims: Vec<usize>, elements: Vec<T>) -> Result<Self> {
        Ok(elements.into_boxed_slice())
    }
}

impl<T: Wire, const N: usize> ArrayValue for [T; N] {
    type Element = T;

    const FIXED_RANK: Option<usize> = Some(1);

    fn dims(&self) -> Cow<'_, [usize]> {
        Cow::Owned(vec![N])
    }

    fn elements(&self) -> &[T] {
        self
    }

    fn from_parts(_dims: Vec<usize>, elements: Vec<T>) -> Result<Self> {
        let len = elements.len();
        <[T; N]>::try_from(elements).map_err(|_| CodecError::InvalidLength {
            what: "fixed array length",
            value: len as i64,
        })
    }
}

impl<T: Wire> ArrayValue for NdArray<T> {
    type Element = T;

    fn dims(&self) -> Cow<'_, [usize]> {
        Cow::Borrowed(NdArray::dims(self))
    }

    fn elements(&self) -> &[T] {
        self.as_slice()
    }

    fn from_parts(dims: Vec<usize>, elements: Vec<T>) -> Result<Self> {
        NdArray::from_vec(dims, elements)
    }
}

/// 数组处理器。
pub struct ArrayChain<A: ArrayValue> {
    element: Arc<dyn Handler<A::Element>>,
    _marker: PhantomData<fn() -> A>,
}

impl<A: ArrayValue> ArrayChain<A> {
    pub fn new(element: Arc<dyn Handler<A::Element>>) -> Self {
        Self {
            element,
            _marker: PhantomData,
        }
    }

    /// 以元素处理器组装数组处理器。
    pub fn assemble(parts: &[ErasedHandler]) -> Result<ErasedHandler> {
        let element = inner_part::<A, A::Element>(parts, 0)?;
        Ok(ErasedHandler::new::<A, _>(Self::new(element)))
    }
}

fn length_field(what: &'static str, value: usize) -> Result<i32> {
    i32::try_from(value).map_err(|_| CodecError::InvalidLength {
        what,
        value: value as i64,
    })
}

fn read_dimension(session: &mut DecodeSession<'_>, what: &'static str) -> Result<usize> {
    let raw = session.channel().read::<i32>()?;
    usize::try_from(raw).map_err(|_| CodecError::InvalidLength {
        what,
        value: i64::from(raw),
    })
}

impl<A: ArrayValue> Handler<A> for ArrayChain<A> {
    fn encode(&self, value: &A, session: &mut EncodeSession<'_>) -> Result<()> {
        session.nested(|session| {
            let dims = value.dims();
            let elements = value.elements();
            if dims.is_empty() {
                return Err(CodecError::InvalidLength {
                    what: "array rank",
                    value: 0,
                });
            }
            let rank = length_field("array rank", dims.len())?;
            session.channel().write(rank);
            if dims.len() == 1 {
                session
                    .channel()
                    .write(length_field("array length", elements.len())?);
            } else {
                for &dim in dims.iter() {
                    session.channel().write(length_field("array dimension", dim)?);
                }
            }
            for element in elements {
                self.element.encode(element, session)?;
            }
            Ok(())
        })
    }

    fn decode(&self, session: &mut DecodeSession<'_>) -> Result<A> {
        session.nested(|session| {
            let raw_rank = session.channel().read::<i32>()?;
            let rank = usize::try_from(raw_rank)
                .ok()
                .filter(|rank| (1..=MAX_RANK).contains(rank))
                .filter(|rank| A::FIXED_RANK.is_none_or(|fixed| fixed == *rank))
                .ok_or(CodecError::InvalidLength {
                    what: "array rank",
                    value: i64::from(raw_rank),
                })?;

            let mut dims = Vec::with_capacity(rank);
            for _ in 0..rank {
                let what = if rank == 1 {
                    "array length"
                } else {
                    "array dimension"
                };
                dims.push(read_dimension(session, what)?);
            }
            let total = dims
                .iter()
                .try_fold(1_usize, |acc, dim| acc.checked_mul(*dim))
                .ok_or(CodecError::InvalidLength {
                    what: "array element count",
                    value: i64::MAX,
                })?;

            let available = session.channel().available();
            let mut elements = Vec::with_capacity(capacity_hint(total, available));
            for _ in 0..total {
                elements.push(self.element.decode(session)?);
            }
            A::from_parts(dims, elements)
        })
    }
}
