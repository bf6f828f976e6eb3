//! Property tests for the typed register codec

use proptest::prelude::*;
use resilient_modbus::codec::{decode, encode, DataType, Endian, TypedValue};
use resilient_modbus::ModbusError;

fn any_endian() -> impl Strategy<Value = Endian> {
    prop::sample::select(Endian::ALL.to_vec())
}

fn round_trip(value: TypedValue, endian: Endian) -> TypedValue {
    let regs = encode(&value, endian).unwrap();
    assert_eq!(regs.len(), value.data_type().register_count());
    decode(&regs, value.data_type(), endian).unwrap()
}

proptest! {
    #[test]
    fn integers_round_trip(
        endian in any_endian(),
        a in any::<i16>(),
        b in any::<u16>(),
        c in any::<i32>(),
        d in any::<u32>(),
        e in any::<i64>(),
        f in any::<u64>(),
    ) {
        for value in [
            TypedValue::I16(a),
            TypedValue::U16(b),
            TypedValue::I32(c),
            TypedValue::U32(d),
            TypedValue::I64(e),
            TypedValue::U64(f),
        ] {
            prop_assert_eq!(round_trip(value, endian), value);
        }
    }

    #[test]
    fn finite_floats_round_trip(
        endian in any_endian(),
        x in any::<f32>().prop_filter("finite", |v| v.is_finite()),
        y in any::<f64>().prop_filter("finite", |v| v.is_finite()),
    ) {
        match round_trip(TypedValue::F32(x), endian) {
            TypedValue::F32(back) => prop_assert_eq!(back.to_bits(), x.to_bits()),
            other => prop_assert!(false, "unexpected {:?}", other),
        }
        match round_trip(TypedValue::F64(y), endian) {
            TypedValue::F64(back) => prop_assert_eq!(back.to_bits(), y.to_bits()),
            other => prop_assert!(false, "unexpected {:?}", other),
        }
    }

    #[test]
    fn little_endian_reverses_words(value in any::<u64>()) {
        let be = encode(&TypedValue::U64(value), Endian::Be).unwrap();
        let le = encode(&TypedValue::U64(value), Endian::Le).unwrap();
        let reversed: Vec<u16> = be.iter().rev().copied().collect();
        prop_assert_eq!(le, reversed);

        let be_swap = encode(&TypedValue::U64(value), Endian::BeSwap).unwrap();
        let swapped: Vec<u16> = be.iter().map(|w| w.swap_bytes()).collect();
        prop_assert_eq!(be_swap, swapped);
    }

    #[test]
    fn sixteen_bit_ignores_endian(endian in any_endian(), value in any::<u16>()) {
        prop_assert_eq!(
            encode(&TypedValue::U16(value), endian).unwrap(),
            vec![value]
        );
    }

    #[test]
    fn integer_range_checks(value in any::<i64>()) {
        let wide = i128::from(value);
        prop_assert_eq!(
            TypedValue::from_integer(DataType::Int16, wide).is_ok(),
            i16::try_from(value).is_ok()
        );
        prop_assert_eq!(
            TypedValue::from_integer(DataType::Uint32, wide).is_ok(),
            u32::try_from(value).is_ok()
        );
        prop_assert!(TypedValue::from_integer(DataType::Int64, wide).is_ok());
    }

    #[test]
    fn wrong_register_count_rejected(
        endian in any_endian(),
        regs in prop::collection::vec(any::<u16>(), 0..8),
    ) {
        for data_type in DataType::ALL {
            let result = decode(&regs, data_type, endian);
            if regs.len() == data_type.register_count() {
                prop_assert!(result.is_ok());
            } else {
                prop_assert!(matches!(result, Err(ModbusError::Conversion(_))));
            }
        }
    }
}

#[test]
fn test_non_finite_floats_rejected() {
    for endian in Endian::ALL {
        for value in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            assert!(matches!(
                encode(&TypedValue::F32(value), endian),
                Err(ModbusError::Conversion(_))
            ));
        }
        assert!(encode(&TypedValue::F64(f64::NAN), endian).is_err());
    }
}
