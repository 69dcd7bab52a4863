mod tests {
    use myrtio_ws2812_dma::color::{
        ChannelOffsets, ColorOrder, Rgb, StripType, color, rgb_from_u32, rgb_to_u32, unpack,
    };

    #[test]
    fn test_color_packing() {
        assert_eq!(color(255, 0, 0), 0xFF_0000);
        assert_eq!(color(0, 255, 0), 0x00_FF00);
        assert_eq!(color(0, 0, 255), 0x00_00FF);
        assert_eq!(color(0x12, 0x34, 0x56), 0x12_3456);
    }

    #[test]
    fn test_unpack_round_trip() {
        for value in 0..=255u8 {
            let (r, g, b) = (value, 255 - value, value ^ 0x5A);
            assert_eq!(unpack(color(r, g, b)), (r, g, b));
        }
    }

    #[test]
    fn test_unpack_ignores_high_byte() {
        assert_eq!(unpack(0xFF12_3456), (0x12, 0x34, 0x56));
    }

    #[test]
    fn test_rgb_conversion() {
        let rgb = Rgb::new(1, 2, 3);
        assert_eq!(rgb_to_u32(rgb), 0x01_0203);
        assert_eq!(rgb_from_u32(0x01_0203), rgb);
    }

    #[test]
    fn test_strip_type_decoding() {
        assert_eq!(StripType::default().color_order(), ColorOrder::Grb);
        assert_eq!(StripType::RGB.color_order(), ColorOrder::Rgb);
        assert_eq!(
            (StripType::BRG | StripType::KHZ800).color_order(),
            ColorOrder::Brg
        );
        assert_eq!(StripType::RBG.color_order(), ColorOrder::Rbg);
        assert_eq!(StripType::from_bits(0x02).color_order(), ColorOrder::Rgb);
    }

    #[test]
    fn test_strip_type_priority() {
        assert_eq!(
            (StripType::GRB | StripType::BRG).color_order(),
            ColorOrder::Grb
        );
        assert_eq!(
            (StripType::BRG | StripType::RBG).color_order(),
            ColorOrder::Brg
        );
    }

    #[test]
    fn test_strip_type_bits() {
        assert_eq!(StripType::default().bits(), 0x03);
        assert_eq!(StripType::from(0x08), StripType::RBG);
    }

    #[test]
    fn test_channel_offsets() {
        assert_eq!(
            ColorOrder::Grb.offsets(),
            ChannelOffsets { r: 1, g: 0, b: 2 }
        );
        assert_eq!(
            ColorOrder::Brg.offsets(),
            ChannelOffsets { r: 1, g: 2, b: 0 }
        );
        assert_eq!(
            ColorOrder::Rbg.offsets(),
            ChannelOffsets { r: 0, g: 2, b: 1 }
        );
        assert_eq!(
            ColorOrder::Rgb.offsets(),
            ChannelOffsets { r: 0, g: 1, b: 2 }
        );
    }
}
