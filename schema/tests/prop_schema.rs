use bitstream::{BitReader, BitWriter};
use proptest::prelude::*;
use schema::{FieldType, QuantizeFlags, QuantizedFloat};

proptest! {
    #[test]
    fn quantized_decode_stays_in_range(
        bits in 1i32..24,
        low in -4096.0f32..0.0,
        span in 1.0f32..8192.0,
        raw in any::<u32>(),
    ) {
        let high = low + span;
        let Ok(qf) = QuantizedFloat::new(Some(bits), None, Some(low), Some(high)) else {
            return Ok(());
        };
        let raw = u64::from(raw) & ((1u64 << qf.bit_count()) - 1);
        let mut writer = BitWriter::new();
        writer.write_bits(raw, qf.bit_count() as u8).unwrap();
        let bytes = writer.finish();
        let value = qf.decode(&mut BitReader::new(&bytes)).unwrap();
        let tolerance = span * 1e-4;
        prop_assert!(value >= qf.low() - tolerance, "{value} < {}", qf.low());
        prop_assert!(value <= qf.high() + tolerance, "{value} > {}", qf.high());
    }

    #[test]
    fn quantized_flags_never_combine_rounding(
        bits in 1i32..31,
        flags in 0i32..16,
        low in -100.0f32..100.0,
        span in 0.5f32..500.0,
    ) {
        if let Ok(qf) = QuantizedFloat::new(Some(bits), Some(flags), Some(low), Some(low + span)) {
            let both = QuantizeFlags::ROUND_DOWN | QuantizeFlags::ROUND_UP;
            prop_assert!(!qf.flags().contains(both));
            if qf.flags().contains(QuantizeFlags::ENCODE_INTEGERS) {
                prop_assert!(!qf.flags().intersects(both | QuantizeFlags::ENCODE_ZERO));
            }
        }
    }

    #[test]
    fn field_type_parse_never_panics(name in "[A-Za-z_<>*\\[\\] 0-9]{0,40}") {
        let _ = FieldType::parse(&name);
    }
}
