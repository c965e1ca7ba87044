//! 注册中心：缓存策略、幂等解析与构建器协作。

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use spark_codec_graph::{
    ByteChannel, CachePolicy, CodecError, ErasedHandler, FnHandler, Handler, HandlerBuilder,
    HandlerRegistry, RegistryConfig, Resolver, Result, Serializer, TypeDescriptor, Wire,
};

#[derive(Debug, PartialEq)]
struct Celsius(f32);

impl Wire for Celsius {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::opaque::<Self>()
    }
}

#[derive(Debug, PartialEq)]
struct Readings(Vec<f32>);

impl Wire for Readings {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::opaque::<Self>()
    }
}

/// 为 `Celsius` 与 `Readings` 提供处理器的外部构建器。
struct SensorBuilder;

impl HandlerBuilder for SensorBuilder {
    fn name(&self) -> &'static str {
        "sensor"
    }

    fn build(
        &self,
        resolver: &mut Resolver<'_>,
        descriptor: &TypeDescriptor,
    ) -> Result<Option<ErasedHandler>> {
        if descriptor.type_id() == TypeId::of::<Celsius>() {
            let handler = FnHandler::new(
                |value: &Celsius, session| {
                    session.channel().write(value.0);
                    Ok(())
                },
                |session| Ok(Celsius(session.channel().read()?)),
            );
            return Ok(Some(ErasedHandler::new::<Celsius, _>(handler)));
        }
        if descriptor.type_id() == TypeId::of::<Readings>() {
            let inner = resolver.resolve_type::<Vec<f32>>()?;
            let decode_inner = inner.clone();
            let handler = FnHandler::new(
                move |value: &Readings, session| inner.encode(&value.0, session),
                move |session| Ok(Readings(decode_inner.decode(session)?)),
            );
            return Ok(Some(ErasedHandler::new::<Readings, _>(handler)));
        }
        Ok(None)
    }
}

/// 只记录被询问次数、从不构建的构建器。
#[derive(Clone, Default)]
struct CountingBuilder {
    calls: Arc<AtomicUsize>,
}

impl HandlerBuilder for CountingBuilder {
    fn build(
        &self,
        _resolver: &mut Resolver<'_>,
        _descriptor: &TypeDescriptor,
    ) -> Result<Option<ErasedHandler>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }
}

/// 结构上自引用、且由外部构建器拆解的类型。
#[derive(Debug, Default)]
struct Tree {
    children: Vec<Tree>,
}

impl Wire for Tree {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::opaque::<Self>()
    }
}

struct TreeBuilder;

impl HandlerBuilder for TreeBuilder {
    fn build(
        &self,
        resolver: &mut Resolver<'_>,
        descriptor: &TypeDescriptor,
    ) -> Result<Option<ErasedHandler>> {
        if descriptor.type_id() != TypeId::of::<Tree>() {
            return Ok(None);
        }
        let children = resolver.resolve_type::<Vec<Tree>>()?;
        let decode_children = children.clone();
        let handler = FnHandler::new(
            move |value: &Tree, session| children.encode(&value.children, session),
            move |session| {
                Ok(Tree {
                    children: decode_children.decode(session)?,
                })
            },
        );
        Ok(Some(ErasedHandler::new::<Tree, _>(handler)))
    }
}

#[test]
fn builtins_resolve_without_building() {
    let registry = HandlerRegistry::new();
    let before = registry.len();
    for descriptor in [
        i8::descriptor(),
        u16::descriptor(),
        f64::descriptor(),
        bool::descriptor(),
        String::descriptor(),
    ] {
        assert!(registry.resolve(&descriptor, CachePolicy::ForceOn).unwrap().is_some());
    }
    assert_eq!(registry.len(), before);
}

#[test]
fn repeated_resolution_returns_the_same_instance() {
    let registry = HandlerRegistry::new();
    let descriptor = HashMap::<String, Vec<i64>>::descriptor();
    let first = registry
        .resolve(&descriptor, CachePolicy::UseDefault)
        .unwrap()
        .unwrap();
    let second = registry
        .resolve(&descriptor, CachePolicy::UseDefault)
        .unwrap()
        .unwrap();
    assert!(first.ptr_eq(&second));
    assert!(registry.is_cached::<Vec<i64>>());
    // 映射直接持有键、值处理器，不经过键值对。
    assert!(!registry.is_cached::<(String, Vec<i64>)>());
}

#[test]
fn concurrent_first_resolution_converges_on_one_handler() {
    let registry = HandlerRegistry::new();
    let barrier = Barrier::new(8);
    let descriptor = Vec::<HashMap<u32, Box<[String]>>>::descriptor();

    let handlers: Vec<ErasedHandler> = thread::scope(|scope| {
        let workers: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    registry
                        .resolve(&descriptor, CachePolicy::ForceOn)
                        .unwrap()
                        .unwrap()
                })
            })
            .collect();
        workers.into_iter().map(|worker| worker.join().unwrap()).collect()
    });

    let canonical = registry
        .resolve(&descriptor, CachePolicy::ForceOn)
        .unwrap()
        .unwrap();
    assert!(handlers.iter().all(|handler| handler.ptr_eq(&canonical)));
}

#[test]
fn force_off_builds_without_caching() {
    let registry = HandlerRegistry::new();
    let descriptor = Vec::<Vec<u8>>::descriptor();
    let first = registry
        .resolve(&descriptor, CachePolicy::ForceOff)
        .unwrap()
        .unwrap();
    let second = registry
        .resolve(&descriptor, CachePolicy::ForceOff)
        .unwrap()
        .unwrap();
    assert!(!first.ptr_eq(&second));
    assert!(!registry.is_cached::<Vec<Vec<u8>>>());
    assert!(!registry.is_cached::<Vec<u8>>());
}

#[test]
fn default_policy_follows_configuration() {
    let registry = HandlerRegistry::with_config(RegistryConfig::default().with_cache_by_default(false));
    registry
        .resolve(&Vec::<i16>::descriptor(), CachePolicy::UseDefault)
        .unwrap()
        .unwrap();
    assert!(!registry.is_cached::<Vec<i16>>());

    registry
        .resolve(&Vec::<i16>::descriptor(), CachePolicy::ForceOn)
        .unwrap()
        .unwrap();
    assert!(registry.is_cached::<Vec<i16>>());
}

#[test]
fn uncached_serializer_still_roundtrips() {
    let serializer = Serializer::with_config(RegistryConfig::default().with_cache_by_default(false));
    let value = vec![(1_u8, "one".to_owned()), (2, "two".to_owned())];
    let back: Vec<(u8, String)> = serializer
        .from_bytes(&serializer.to_bytes(&value).unwrap())
        .unwrap();
    assert_eq!(back, value);
    assert!(!serializer.registry().is_cached::<Vec<(u8, String)>>());
}

#[test]
fn register_keeps_the_first_handler() {
    let registry = HandlerRegistry::new();
    let celsius = || {
        FnHandler::new(
            |value: &Celsius, session| {
                session.channel().write(value.0);
                Ok(())
            },
            |session| Ok(Celsius(session.channel().read()?)),
        )
    };
    assert!(registry.register::<Celsius, _>(celsius()));
    let installed = registry.cached::<Celsius>().unwrap();
    assert!(!registry.register::<Celsius, _>(celsius()));
    assert!(Arc::ptr_eq(&installed, &registry.cached::<Celsius>().unwrap()));

    let never_used = FnHandler::new(
        |_: &u8, _session| Err(CodecError::custom("test.unused", "replaced builtin")),
        |_session| Err(CodecError::custom("test.unused", "replaced builtin")),
    );
    assert!(!registry.register::<u8, _>(never_used));
    let mut channel = ByteChannel::new();
    registry
        .serialize(&mut channel, &9_u8, CachePolicy::UseDefault, None)
        .unwrap();
    assert_eq!(channel.as_slice(), &[9]);
}

#[test]
fn second_builder_is_a_conflict() {
    let registry = HandlerRegistry::new();
    registry.use_builder(SensorBuilder).unwrap();
    let err = registry.use_builder(TreeBuilder).unwrap_err();
    assert_eq!(err, CodecError::BuilderConflict { installed: "sensor" });

    // 原构建器仍然生效。
    assert!(registry
        .resolve(&Celsius::descriptor(), CachePolicy::UseDefault)
        .unwrap()
        .is_some());
}

#[test]
fn pluggable_builder_handles_opaque_types_inside_chains() {
    let serializer = Serializer::new();
    serializer.registry().use_builder(SensorBuilder).unwrap();

    let value = vec![Celsius(21.5), Celsius(-3.0)];
    let bytes = serializer.to_bytes(&value).unwrap();
    assert_eq!(bytes.len(), 4 + 2 * 4);
    let back: Vec<Celsius> = serializer.from_bytes(&bytes).unwrap();
    assert_eq!(back, value);

    let readings = Readings(vec![0.5, 1.5]);
    let back: Readings = serializer
        .from_bytes(&serializer.to_bytes(&readings).unwrap())
        .unwrap();
    assert_eq!(back, readings);
    assert!(serializer.registry().is_cached::<Vec<f32>>());
}

#[test]
fn integrated_builder_is_asked_before_the_pluggable_one() {
    let registry = HandlerRegistry::new();
    let counting = CountingBuilder::default();
    let calls = counting.calls.clone();
    registry.use_builder(counting).unwrap();

    registry
        .resolve(&Vec::<i32>::descriptor(), CachePolicy::UseDefault)
        .unwrap()
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    assert!(registry
        .resolve(&Celsius::descriptor(), CachePolicy::UseDefault)
        .unwrap()
        .is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn prepare_uses_only_the_integrated_builder() {
    let registry = HandlerRegistry::new();
    registry.use_builder(SensorBuilder).unwrap();

    registry.prepare::<Vec<String>>().unwrap();
    assert!(registry.is_cached::<Vec<String>>());

    let err = registry.prepare::<Celsius>().unwrap_err();
    assert!(matches!(err, CodecError::UnsupportedType { .. }));
    assert!(!registry.is_cached::<Celsius>());

    registry.prepare_with_builder::<Celsius>().unwrap();
    assert!(registry.is_cached::<Celsius>());
}

#[test]
fn prepare_with_builder_requires_a_builder() {
    let registry = HandlerRegistry::new();
    let err = registry.prepare_with_builder::<Celsius>().unwrap_err();
    assert_eq!(err, CodecError::NoBuilderInstalled);
}

#[test]
fn structurally_recursive_builder_is_rejected() {
    let registry = HandlerRegistry::new();
    registry.use_builder(TreeBuilder).unwrap();

    let err = registry
        .resolve(&Tree::descriptor(), CachePolicy::UseDefault)
        .unwrap_err();
    assert!(matches!(err, CodecError::RecursiveType { .. }));
    assert!(!registry.is_cached::<Tree>());

    let mut channel = ByteChannel::new();
    let written = registry
        .try_serialize(&mut channel, &Tree::default(), CachePolicy::UseDefault, None)
        .unwrap();
    assert!(!written);
    assert!(channel.is_empty());
}

#[test]
fn unsupported_inner_type_fails_the_whole_composite() {
    let registry = HandlerRegistry::new();
    let err = registry
        .resolve(&Vec::<Celsius>::descriptor(), CachePolicy::UseDefault)
        .unwrap_err();
    assert!(matches!(err, CodecError::UnsupportedType { .. }));
    assert!(!registry.is_cached::<Vec<Celsius>>());
}
