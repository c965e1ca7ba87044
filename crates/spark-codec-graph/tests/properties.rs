//! 往返性质
//!
//! # 教案级注释概览
//!
//! - **核心目标 (Why)**：对任意生成的无环值验证 `decode(encode(v)) == v`，并确认解码恰好消费编码写出的全部字节；
//! - **设计手法 (How)**：Proptest 分别生成原语、字符串、嵌套集合、多维数组与映射，经由同一个 `Serializer` 往返；
//!   浮点数按位比较，NaN 也必须原样返回；
//! - **边界 (What)**：多维数组的每一维限制在 0..4，空维度也在生成范围内。

use std::collections::{BTreeMap, HashMap};

use proptest::prelude::*;
use spark_codec_graph::{ByteChannel, CachePolicy, NdArray, Serializer, Wire};

fn roundtrip<T: Wire>(serializer: &Serializer, value: &T) -> (T, usize) {
    let bytes = serializer.to_bytes(value).unwrap();
    let mut channel = ByteChannel::from_slice(&bytes);
    let back = serializer
        .registry()
        .deserialize(&mut channel, CachePolicy::UseDefault, None)
        .unwrap();
    assert_eq!(channel.available(), 0);
    (back, bytes.len())
}

fn nd_arrays() -> impl Strategy<Value = NdArray<i16>> {
    prop::collection::vec(0_usize..4, 1..4).prop_flat_map(|dims| {
        let len = dims.iter().product::<usize>();
        prop::collection::vec(any::<i16>(), len)
            .prop_map(move |data| NdArray::from_vec(dims.clone(), data).unwrap())
    })
}

proptest! {
    #[test]
    fn prop_integers_roundtrip(a in any::<i64>(), b in any::<u32>(), c in any::<i8>(), d in any::<bool>()) {
        let serializer = Serializer::new();
        let (back, len) = roundtrip(&serializer, &a);
        prop_assert_eq!(back, a);
        prop_assert_eq!(len, 8);
        prop_assert_eq!(roundtrip(&serializer, &b).0, b);
        prop_assert_eq!(roundtrip(&serializer, &c).0, c);
        prop_assert_eq!(roundtrip(&serializer, &d).0, d);
    }

    #[test]
    fn prop_floats_roundtrip_bitwise(x in any::<f64>(), y in any::<f32>()) {
        let serializer = Serializer::new();
        prop_assert_eq!(roundtrip(&serializer, &x).0.to_bits(), x.to_bits());
        prop_assert_eq!(roundtrip(&serializer, &y).0.to_bits(), y.to_bits());
    }

    #[test]
    fn prop_strings_roundtrip(text in any::<String>()) {
        let serializer = Serializer::new();
        let (back, len) = roundtrip(&serializer, &text);
        prop_assert!(len >= text.len() + 1);
        prop_assert_eq!(back, text);
    }

    #[test]
    fn prop_nested_collections_roundtrip(value in prop::collection::vec(prop::collection::vec(any::<u16>(), 0..8), 0..8)) {
        let serializer = Serializer::new();
        prop_assert_eq!(roundtrip(&serializer, &value).0, value);
    }

    #[test]
    fn prop_nd_arrays_keep_shape(array in nd_arrays()) {
        let serializer = Serializer::new();
        let (back, len) = roundtrip(&serializer, &array);
        prop_assert_eq!(back.dims(), array.dims());
        prop_assert_eq!(back.as_slice(), array.as_slice());
        let header = if array.rank() == 1 { 4 + 4 } else { 4 + 4 * array.rank() };
        prop_assert_eq!(len, header + 2 * array.len());
    }

    #[test]
    fn prop_maps_roundtrip(
        hashed in prop::collection::hash_map(any::<String>(), any::<i32>(), 0..16),
        ordered in prop::collection::btree_map(any::<u8>(), prop::collection::vec(any::<bool>(), 0..4), 0..16),
    ) {
        let serializer = Serializer::new();
        prop_assert_eq!(roundtrip(&serializer, &hashed).0, hashed);
        let back: BTreeMap<u8, Vec<bool>> = roundtrip(&serializer, &ordered).0;
        prop_assert_eq!(back, ordered);
    }

    #[test]
    fn prop_truncated_input_never_panics(value in prop::collection::vec(any::<String>(), 1..6), cut in any::<prop::sample::Index>()) {
        let serializer = Serializer::new();
        let bytes = serializer.to_bytes(&value).unwrap();
        let cut = cut.index(bytes.len());
        let result = serializer.from_bytes::<Vec<String>>(&bytes[..cut]);
        prop_assert!(result.is_err());
    }
}

#[test]
fn map_types_share_one_registry() {
    let serializer = Serializer::new();
    let value: HashMap<u8, u8> = (0..10).map(|i| (i, i * 2)).collect();
    assert_eq!(roundtrip(&serializer, &value).0, value);
    assert!(serializer.registry().is_cached::<HashMap<u8, u8>>());
}
