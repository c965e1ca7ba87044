//! [`Wire`]：把 Rust 类型接入编解码分派。
//!
//! # 设计背景（Why）
//! - 注册中心按 `TypeId` 查找处理器，缓存未命中时需要类型的结构信息才能构建处理器；
//!   `Wire::descriptor` 在编译期为每个类型生成这份信息；
//! - 标准库容器、`Arc` 共享引用与 `parking_lot` 锁的实现都在此处集中给出，
//!   用户类型通过 [`TypeDescriptor::self_coded`] 或 [`TypeDescriptor::opaque`] 接入。
//!
//! # 契约说明（What）
//! - 拥有所有权的容器（`Vec`、`Box<[T]>`、`NdArray`、`String` 等）是值类型：完整写出，不带标签；
//! - 只有经由 `Arc` 到达的值才参与引用优化。

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, LinkedList, VecDeque};
use std::hash::Hash;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};

use crate::descriptor::TypeDescriptor;
use crate::ndarray::NdArray;

/// 可编解码的类型。
pub trait Wire: Send + Sync + 'static + Sized {
    /// 描述类型的结构形态。
    fn descriptor() -> TypeDescriptor;
}

macro_rules! impl_primitive_wire {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Wire for $ty {
                fn descriptor() -> TypeDescriptor {
                    TypeDescriptor::primitive::<Self>()
                }
            }
        )*
    };
}

impl_primitive_wire!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64, bool, String, Bytes);

impl<T: Wire> Wire for Box<[T]> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::array::<Self>()
    }
}

impl<T: Wire, const N: usize> Wire for [T; N] {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::array::<Self>()
    }
}

impl<T: Wire> Wire for NdArray<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::array::<Self>()
    }
}

impl<T: Wire> Wire for Vec<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::collection::<Self>()
    }
}

impl<T: Wire> Wire for VecDeque<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::collection::<Self>()
    }
}

impl<T: Wire> Wire for LinkedList<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::collection::<Self>()
    }
}

impl<T: Wire + Eq + Hash> Wire for HashSet<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::collection::<Self>()
    }
}

impl<T: Wire + Ord> Wire for BTreeSet<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::collection::<Self>()
    }
}

impl<K: Wire + Eq + Hash, V: Wire> Wire for HashMap<K, V> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::map::<Self>()
    }
}

impl<K: Wire + Ord, V: Wire> Wire for BTreeMap<K, V> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::map::<Self>()
    }
}

impl<K: Wire, V: Wire> Wire for (K, V) {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::pair::<K, V>()
    }
}

impl<T: Wire> Wire for Arc<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::reference::<Self>()
    }
}

impl<T: Wire> Wire for Option<Arc<T>> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::reference::<Self>()
    }
}

impl<T: Wire + Default> Wire for RwLock<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::lock::<Self>()
    }
}

impl<T: Wire + Default> Wire for Mutex<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::lock::<Self>()
    }
}
