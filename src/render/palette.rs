//! Fixed logarithmic colour scale for spectral magnitudes.
//!
//! Magnitudes are mapped over six decades, `1e-7` to `1e-1`, onto a
//! 256-entry inferno ramp. The bounds are absolute so the same colour means
//! the same level in every session.

use bytemuck::{Pod, Zeroable};

pub const PALETTE_SIZE: usize = 256;

/// Lower and upper bound of the scale, in decades (log10).
pub const LOG_FLOOR: f32 = -7.0;
pub const LOG_CEILING: f32 = -1.0;

// Smallest magnitude taken into the log; anything below maps like it.
const POWER_EPSILON: f32 = 1.0e-20;

/// Legend labels from the top (palette maximum) to the bottom of the scale.
pub const SCALE_TICKS: [&str; 7] = ["100m", "10m", "1m", "100u", "10u", "1u", "100n"];
pub const SCALE_UNIT: &str = "V/sqrt(Hz)";

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Palette index for a magnitude. NaN ("no data") and anything at or below
/// the floor map to 0.
pub fn color_index(value: f32) -> usize {
    if value.is_nan() {
        return 0;
    }

    let log_value = value.max(POWER_EPSILON).log10();
    let position = (log_value - LOG_FLOOR) / (LOG_CEILING - LOG_FLOOR) * PALETTE_SIZE as f32;
    position.round().clamp(0.0, (PALETTE_SIZE - 1) as f32) as usize
}

pub fn color(value: f32) -> Rgb {
    INFERNO[color_index(value)]
}

/// Palette index for pixel row `row` (0 = top) of a legend `height` rows tall.
pub fn legend_index(row: usize, height: usize) -> usize {
    if height == 0 || row >= height {
        return 0;
    }
    let fraction = (height - row - 1) as f32 / height as f32;
    ((fraction * PALETTE_SIZE as f32) as usize).min(PALETTE_SIZE - 1)
}

/// Tick labels paired with their offset from the top of the legend, in `0..=1`.
pub fn scale_ticks() -> impl Iterator<Item = (&'static str, f32)> {
    let last = (SCALE_TICKS.len() - 1) as f32;
    SCALE_TICKS
        .iter()
        .enumerate()
        .map(move |(idx, label)| (*label, idx as f32 / last))
}

pub static INFERNO: [Rgb; PALETTE_SIZE] = [
    Rgb::new(0, 0, 4),
    Rgb::new(1, 0, 5),
    Rgb::new(1, 1, 6),
    Rgb::new(1, 1, 8),
    Rgb::new(2, 1, 10),
    Rgb::new(2, 2, 12),
    Rgb::new(2, 2, 14),
    Rgb::new(3, 2, 16),
    Rgb::new(4, 3, 18),
    Rgb::new(4, 3, 20),
    Rgb::new(5, 4, 23),
    Rgb::new(6, 4, 25),
    Rgb::new(7, 5, 27),
    Rgb::new(8, 5, 29),
    Rgb::new(9, 6, 31),
    Rgb::new(10, 7, 34),
    Rgb::new(11, 7, 36),
    Rgb::new(12, 8, 38),
    Rgb::new(13, 8, 41),
    Rgb::new(14, 9, 43),
    Rgb::new(16, 9, 45),
    Rgb::new(17, 10, 48),
    Rgb::new(18, 10, 50),
    Rgb::new(20, 11, 52),
    Rgb::new(21, 11, 55),
    Rgb::new(22, 11, 57),
    Rgb::new(24, 12, 60),
    Rgb::new(25, 12, 62),
    Rgb::new(27, 12, 65),
    Rgb::new(28, 12, 67),
    Rgb::new(30, 12, 69),
    Rgb::new(31, 12, 72),
    Rgb::new(33, 12, 74),
    Rgb::new(35, 12, 76),
    Rgb::new(36, 12, 79),
    Rgb::new(38, 12, 81),
    Rgb::new(40, 11, 83),
    Rgb::new(41, 11, 85),
    Rgb::new(43, 11, 87),
    Rgb::new(45, 11, 89),
    Rgb::new(47, 10, 91),
    Rgb::new(49, 10, 92),
    Rgb::new(50, 10, 94),
    Rgb::new(52, 10, 95),
    Rgb::new(54, 9, 97),
    Rgb::new(56, 9, 98),
    Rgb::new(57, 9, 99),
    Rgb::new(59, 9, 100),
    Rgb::new(61, 9, 101),
    Rgb::new(62, 9, 102),
    Rgb::new(64, 10, 103),
    Rgb::new(66, 10, 104),
    Rgb::new(68, 10, 104),
    Rgb::new(69, 10, 105),
    Rgb::new(71, 11, 106),
    Rgb::new(73, 11, 106),
    Rgb::new(74, 12, 107),
    Rgb::new(76, 12, 107),
    Rgb::new(77, 13, 108),
    Rgb::new(79, 13, 108),
    Rgb::new(81, 14, 108),
    Rgb::new(82, 14, 109),
    Rgb::new(84, 15, 109),
    Rgb::new(85, 15, 109),
    Rgb::new(87, 16, 110),
    Rgb::new(89, 16, 110),
    Rgb::new(90, 17, 110),
    Rgb::new(92, 18, 110),
    Rgb::new(93, 18, 110),
    Rgb::new(95, 19, 110),
    Rgb::new(97, 19, 110),
    Rgb::new(98, 20, 110),
    Rgb::new(100, 21, 110),
    Rgb::new(101, 21, 110),
    Rgb::new(103, 22, 110),
    Rgb::new(105, 22, 110),
    Rgb::new(106, 23, 110),
    Rgb::new(108, 24, 110),
    Rgb::new(109, 24, 110),
    Rgb::new(111, 25, 110),
    Rgb::new(113, 25, 110),
    Rgb::new(114, 26, 110),
    Rgb::new(116, 26, 110),
    Rgb::new(117, 27, 110),
    Rgb::new(119, 28, 109),
    Rgb::new(120, 28, 109),
    Rgb::new(122, 29, 109),
    Rgb::new(124, 29, 109),
    Rgb::new(125, 30, 109),
    Rgb::new(127, 30, 108),
    Rgb::new(128, 31, 108),
    Rgb::new(130, 32, 108),
    Rgb::new(132, 32, 107),
    Rgb::new(133, 33, 107),
    Rgb::new(135, 33, 107),
    Rgb::new(136, 34, 106),
    Rgb::new(138, 34, 106),
    Rgb::new(140, 35, 105),
    Rgb::new(141, 35, 105),
    Rgb::new(143, 36, 105),
    Rgb::new(144, 37, 104),
    Rgb::new(146, 37, 104),
    Rgb::new(147, 38, 103),
    Rgb::new(149, 38, 103),
    Rgb::new(151, 39, 102),
    Rgb::new(152, 39, 102),
    Rgb::new(154, 40, 101),
    Rgb::new(155, 41, 100),
    Rgb::new(157, 41, 100),
    Rgb::new(159, 42, 99),
    Rgb::new(160, 42, 99),
    Rgb::new(162, 43, 98),
    Rgb::new(163, 44, 97),
    Rgb::new(165, 44, 96),
    Rgb::new(166, 45, 96),
    Rgb::new(168, 46, 95),
    Rgb::new(169, 46, 94),
    Rgb::new(171, 47, 94),
    Rgb::new(173, 48, 93),
    Rgb::new(174, 48, 92),
    Rgb::new(176, 49, 91),
    Rgb::new(177, 50, 90),
    Rgb::new(179, 50, 90),
    Rgb::new(180, 51, 89),
    Rgb::new(182, 52, 88),
    Rgb::new(183, 53, 87),
    Rgb::new(185, 53, 86),
    Rgb::new(186, 54, 85),
    Rgb::new(188, 55, 84),
    Rgb::new(189, 56, 83),
    Rgb::new(191, 57, 82),
    Rgb::new(192, 58, 81),
    Rgb::new(193, 58, 80),
    Rgb::new(195, 59, 79),
    Rgb::new(196, 60, 78),
    Rgb::new(198, 61, 77),
    Rgb::new(199, 62, 76),
    Rgb::new(200, 63, 75),
    Rgb::new(202, 64, 74),
    Rgb::new(203, 65, 73),
    Rgb::new(204, 66, 72),
    Rgb::new(206, 67, 71),
    Rgb::new(207, 68, 70),
    Rgb::new(208, 69, 69),
    Rgb::new(210, 70, 68),
    Rgb::new(211, 71, 67),
    Rgb::new(212, 72, 66),
    Rgb::new(213, 74, 65),
    Rgb::new(215, 75, 63),
    Rgb::new(216, 76, 62),
    Rgb::new(217, 77, 61),
    Rgb::new(218, 78, 60),
    Rgb::new(219, 80, 59),
    Rgb::new(221, 81, 58),
    Rgb::new(222, 82, 56),
    Rgb::new(223, 83, 55),
    Rgb::new(224, 85, 54),
    Rgb::new(225, 86, 53),
    Rgb::new(226, 87, 52),
    Rgb::new(227, 89, 51),
    Rgb::new(228, 90, 49),
    Rgb::new(229, 92, 48),
    Rgb::new(230, 93, 47),
    Rgb::new(231, 94, 46),
    Rgb::new(232, 96, 45),
    Rgb::new(233, 97, 43),
    Rgb::new(234, 99, 42),
    Rgb::new(235, 100, 41),
    Rgb::new(235, 102, 40),
    Rgb::new(236, 103, 38),
    Rgb::new(237, 105, 37),
    Rgb::new(238, 106, 36),
    Rgb::new(239, 108, 35),
    Rgb::new(239, 110, 33),
    Rgb::new(240, 111, 32),
    Rgb::new(241, 113, 31),
    Rgb::new(241, 115, 29),
    Rgb::new(242, 116, 28),
    Rgb::new(243, 118, 27),
    Rgb::new(243, 120, 25),
    Rgb::new(244, 121, 24),
    Rgb::new(245, 123, 23),
    Rgb::new(245, 125, 21),
    Rgb::new(246, 126, 20),
    Rgb::new(246, 128, 19),
    Rgb::new(247, 130, 18),
    Rgb::new(247, 132, 16),
    Rgb::new(248, 133, 15),
    Rgb::new(248, 135, 14),
    Rgb::new(248, 137, 12),
    Rgb::new(249, 139, 11),
    Rgb::new(249, 140, 10),
    Rgb::new(249, 142, 9),
    Rgb::new(250, 144, 8),
    Rgb::new(250, 146, 7),
    Rgb::new(250, 148, 7),
    Rgb::new(251, 150, 6),
    Rgb::new(251, 151, 6),
    Rgb::new(251, 153, 6),
    Rgb::new(251, 155, 6),
    Rgb::new(251, 157, 7),
    Rgb::new(252, 159, 7),
    Rgb::new(252, 161, 8),
    Rgb::new(252, 163, 9),
    Rgb::new(252, 165, 10),
    Rgb::new(252, 166, 12),
    Rgb::new(252, 168, 13),
    Rgb::new(252, 170, 15),
    Rgb::new(252, 172, 17),
    Rgb::new(252, 174, 18),
    Rgb::new(252, 176, 20),
    Rgb::new(252, 178, 22),
    Rgb::new(252, 180, 24),
    Rgb::new(251, 182, 26),
    Rgb::new(251, 184, 29),
    Rgb::new(251, 186, 31),
    Rgb::new(251, 188, 33),
    Rgb::new(251, 190, 35),
    Rgb::new(250, 192, 38),
    Rgb::new(250, 194, 40),
    Rgb::new(250, 196, 42),
    Rgb::new(250, 198, 45),
    Rgb::new(249, 199, 47),
    Rgb::new(249, 201, 50),
    Rgb::new(249, 203, 53),
    Rgb::new(248, 205, 55),
    Rgb::new(248, 207, 58),
    Rgb::new(247, 209, 61),
    Rgb::new(247, 211, 64),
    Rgb::new(246, 213, 67),
    Rgb::new(246, 215, 70),
    Rgb::new(245, 217, 73),
    Rgb::new(245, 219, 76),
    Rgb::new(244, 221, 79),
    Rgb::new(244, 223, 83),
    Rgb::new(244, 225, 86),
    Rgb::new(243, 227, 90),
    Rgb::new(243, 229, 93),
    Rgb::new(242, 230, 97),
    Rgb::new(242, 232, 101),
    Rgb::new(242, 234, 105),
    Rgb::new(241, 236, 109),
    Rgb::new(241, 237, 113),
    Rgb::new(241, 239, 117),
    Rgb::new(241, 241, 121),
    Rgb::new(242, 242, 125),
    Rgb::new(242, 244, 130),
    Rgb::new(243, 245, 134),
    Rgb::new(243, 246, 138),
    Rgb::new(244, 248, 142),
    Rgb::new(245, 249, 146),
    Rgb::new(246, 250, 150),
    Rgb::new(248, 251, 154),
    Rgb::new(249, 252, 157),
    Rgb::new(250, 253, 161),
    Rgb::new(252, 255, 164),
];
