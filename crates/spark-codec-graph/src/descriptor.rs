//! 类型描述符：编解码分派所依据的“类型自身”。
//!
//! # 设计背景（Why）
//! - 没有运行时反射时，注册中心仍需知道一个类型是原语、数组、集合、映射、键值对还是共享引用，
//!   以及它的内部类型是什么；[`TypeDescriptor`] 就是由 [`Wire`](crate::Wire) 在编译期生成的这份描述；
//! - 复合描述符附带一个 `assemble` 函数指针：内部处理器解析完成后，由它把处理器组装成
//!   对应的链，这一步是泛型单态化的，构建器本身无需知道具体类型。
//!
//! # 契约说明（What）
//! - 内部类型以 `fn() -> TypeDescriptor` 延迟给出，结构上自引用的类型在生成描述符时不会无限展开；
//! - `self_codec` 非空表示类型自行负责编解码，注册中心不再继续拆解它。

use std::any::{TypeId, type_name};
use std::fmt;

use crate::chain::{
    ArrayChain, ArrayValue, CollectionChain, CollectionValue, LockChain, LockValue, MapChain,
    MapValue, PairChain, ReferenceChain, SharedRef,
};
use crate::contract::{SelfCodec, SelfCodecHandler};
use crate::error::Result;
use crate::handler::ErasedHandler;
use crate::wire::Wire;

/// 延迟生成描述符的函数。
pub type DescriptorFn = fn() -> TypeDescriptor;

/// 以已解析的内部处理器组装复合处理器。
pub type AssembleFn = fn(&[ErasedHandler]) -> Result<ErasedHandler>;

/// 生成自编解码类型处理器的工厂。
pub type SelfCodecFactory = fn() -> ErasedHandler;

/// 复合类型的类别。
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CompositeKind {
    Array,
    Collection,
    Map,
    Pair,
    Reference,
    Lock,
}

/// 复合类型的组成：类别、内部类型与组装函数。
#[derive(Clone)]
pub struct Composite {
    kind: CompositeKind,
    parts: Vec<DescriptorFn>,
    assemble: AssembleFn,
}

impl Composite {
    pub fn new(kind: CompositeKind, parts: Vec<DescriptorFn>, assemble: AssembleFn) -> Self {
        Self {
            kind,
            parts,
            assemble,
        }
    }

    pub fn kind(&self) -> CompositeKind {
        self.kind
    }

    /// 内部类型，顺序与 `assemble` 期望的处理器顺序一致。
    pub fn parts(&self) -> &[DescriptorFn] {
        &self.parts
    }

    /// 以内部处理器组装外层处理器。
    pub fn assemble(&self, inner: &[ErasedHandler]) -> Result<ErasedHandler> {
        (self.assemble)(inner)
    }
}

/// 类型的结构形态。
#[derive(Clone)]
pub enum Shape {
    /// 内建原语，处理器预置在注册中心。
    Primitive,
    /// 由内部类型组成的复合结构。
    Composite(Composite),
    /// 没有可拆解结构，只能由注册的处理器或可插拔构建器服务。
    Opaque,
}

/// 描述一个可编解码类型。
#[derive(Clone)]
pub struct TypeDescriptor {
    type_id: TypeId,
    type_name: &'static str,
    shape: Shape,
    self_codec: Option<SelfCodecFactory>,
}

impl TypeDescriptor {
    fn with_shape<T: 'static>(shape: Shape) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            shape,
            self_codec: None,
        }
    }

    /// 内建原语。
    pub fn primitive<T: 'static>() -> Self {
        Self::with_shape::<T>(Shape::Primitive)
    }

    /// 不透明类型。
    pub fn opaque<T: 'static>() -> Self {
        Self::with_shape::<T>(Shape::Opaque)
    }

    /// 自编解码类型。
    pub fn self_coded<T: SelfCodec>() -> Self {
        Self::opaque::<T>().with_self_codec(|| {
            ErasedHandler::new::<T, _>(SelfCodecHandler::<T>::new())
        })
    }

    /// 附加自编解码工厂。
    pub fn with_self_codec(mut self, factory: SelfCodecFactory) -> Self {
        self.self_codec = Some(factory);
        self
    }

    /// 数组：内部类型为元素。
    pub fn array<A: ArrayValue>() -> Self {
        Self::with_shape::<A>(Shape::Composite(Composite::new(
            CompositeKind::Array,
            vec![<A::Element as Wire>::descriptor as DescriptorFn],
            ArrayChain::<A>::assemble,
        )))
    }

    /// 集合：内部类型为元素。
    pub fn collection<C: CollectionValue>() -> Self {
        Self::with_shape::<C>(Shape::Composite(Composite::new(
            CompositeKind::Collection,
            vec![<C::Element as Wire>::descriptor as DescriptorFn],
            CollectionChain::<C>::assemble,
        )))
    }

    /// 映射：内部类型依次为键、值。
    pub fn map<M: MapValue>() -> Self {
        Self::with_shape::<M>(Shape::Composite(Composite::new(
            CompositeKind::Map,
            vec![<M::Key as Wire>::descriptor as DescriptorFn, <M::Value as Wire>::descriptor],
            MapChain::<M>::assemble,
        )))
    }

    /// 键值对：内部类型依次为键、值。
    pub fn pair<K: Wire, V: Wire>() -> Self {
        Self::with_shape::<(K, V)>(Shape::Composite(Composite::new(
            CompositeKind::Pair,
            vec![K::descriptor as DescriptorFn, V::descriptor],
            PairChain::<K, V>::assemble,
        )))
    }

    /// 共享引用：内部类型为被引用的目标。
    pub fn reference<R: SharedRef>() -> Self {
        Self::with_shape::<R>(Shape::Composite(Composite::new(
            CompositeKind::Reference,
            vec![<R::Target as Wire>::descriptor as DescriptorFn],
            ReferenceChain::<R>::assemble,
        )))
    }

    /// 锁包装：内部类型为被保护的值。
    pub fn lock<L: LockValue>() -> Self {
        Self::with_shape::<L>(Shape::Composite(Composite::new(
            CompositeKind::Lock,
            vec![<L::Inner as Wire>::descriptor as DescriptorFn],
            LockChain::<L>::assemble,
        )))
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn self_codec(&self) -> Option<SelfCodecFactory> {
        self.self_codec
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = match &self.shape {
            Shape::Primitive => "primitive",
            Shape::Opaque => "opaque",
            Shape::Composite(composite) => match composite.kind {
                CompositeKind::Array => "array",
                CompositeKind::Collection => "collection",
                CompositeKind::Map => "map",
                CompositeKind::Pair => "pair",
                CompositeKind::Reference => "reference",
                CompositeKind::Lock => "lock",
            },
        };
        f.debug_struct("TypeDescriptor")
            .field("type_name", &self.type_name)
            .field("shape", &shape)
            .field("self_codec", &self.self_codec.is_some())
            .finish()
    }
}
