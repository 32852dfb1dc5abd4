//! Colour-vision deficiency simulation using Wickline's confusion-line model.
//!
//! Dichromacies project each colour toward the deficiency's confusion point in
//! CIE xyY and fit the result back into the sRGB gamut. The "-omaly" variants
//! blend that result with the original at 1.75:1. Achromatopsia is plain luma.

use std::str::FromStr;

use futures::io::AsyncRead;
use serde::Serialize;
use tracing::debug;

use super::{Rgb, hex_to_rgb, rgb_to_hex};
use crate::error::ToolError;
use crate::images::{self, PixelBuffer};
use crate::source;

const GAMMA: f64 = 2.2;
const ANOMALY_WEIGHT: f64 = 1.75;

// Column-major: X = R*m[0] + G*m[3] + B*m[6], and so on.
const RGB_TO_XYZ: [f64; 9] = [
    0.412_423_712_060_350_76,
    0.212_656_062_156_926_93,
    0.019_331_987_577_444_885,
    0.357_579_340_136_303_5,
    0.715_157_818_248_362,
    0.119_192_678_177_404_76,
    0.180_466_223_236_962_1,
    0.072_186_453_917_156_4,
    0.950_449_168_845_362_9,
];

const XYZ_TO_RGB: [f64; 9] = [
    3.240_712_470_389_558,
    -0.969_259_258_688_888,
    0.055_636_003_153_989_33,
    -1.537_262_660_296_314_2,
    1.875_996_969_313_966,
    -0.203_997_881_293_683_4,
    -0.498_574_404_159_431_16,
    0.041_556_132_211_625_726,
    1.057_063_691_743_398_9,
];

/// Confusion point (`x`, `y`) and the gamut-boundary line (`m`, `yi`) for one dichromacy.
struct ConfusionLine {
    x: f64,
    y: f64,
    m: f64,
    yi: f64,
}

const PROTAN: ConfusionLine = ConfusionLine {
    x: 0.7465,
    y: 0.2535,
    m: 1.273463,
    yi: -0.073894,
};
const DEUTAN: ConfusionLine = ConfusionLine {
    x: 1.4,
    y: -0.4,
    m: 0.968437,
    yi: 0.003331,
};
const TRITAN: ConfusionLine = ConfusionLine {
    x: 0.1748,
    y: 0.0,
    m: 0.062921,
    yi: 0.292119,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationType {
    Protanopia,
    Deuteranopia,
    Tritanopia,
    Protanomaly,
    Deuteranomaly,
    Tritanomaly,
    Achromatopsia,
}

impl SimulationType {
    pub const ALL: [Self; 7] = [
        Self::Protanopia,
        Self::Deuteranopia,
        Self::Tritanopia,
        Self::Protanomaly,
        Self::Deuteranomaly,
        Self::Tritanomaly,
        Self::Achromatopsia,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Self::Protanopia => "protanopia",
            Self::Deuteranopia => "deuteranopia",
            Self::Tritanopia => "tritanopia",
            Self::Protanomaly => "protanomaly",
            Self::Deuteranomaly => "deuteranomaly",
            Self::Tritanomaly => "tritanomaly",
            Self::Achromatopsia => "achromatopsia",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Protanopia => "Protanopia",
            Self::Deuteranopia => "Deuteranopia",
            Self::Tritanopia => "Tritanopia",
            Self::Protanomaly => "Protanomaly",
            Self::Deuteranomaly => "Deuteranomaly",
            Self::Tritanomaly => "Tritanomaly",
            Self::Achromatopsia => "Achromatopsia",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Protanopia => "Red-blind (difficulty seeing reds)",
            Self::Deuteranopia => "Green-blind (difficulty seeing greens)",
            Self::Tritanopia => "Blue-blind (difficulty seeing blues)",
            Self::Protanomaly => "Red-weak (less sensitive to red)",
            Self::Deuteranomaly => "Green-weak (less sensitive to green)",
            Self::Tritanomaly => "Blue-weak (less sensitive to blue)",
            Self::Achromatopsia => "Complete color blindness (only black, white, and gray)",
        }
    }

    fn model(self) -> Option<(&'static ConfusionLine, bool)> {
        match self {
            Self::Protanopia => Some((&PROTAN, false)),
            Self::Deuteranopia => Some((&DEUTAN, false)),
            Self::Tritanopia => Some((&TRITAN, false)),
            Self::Protanomaly => Some((&PROTAN, true)),
            Self::Deuteranomaly => Some((&DEUTAN, true)),
            Self::Tritanomaly => Some((&TRITAN, true)),
            Self::Achromatopsia => None,
        }
    }
}

impl FromStr for SimulationType {
    type Err = ToolError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.id() == normalized)
            .ok_or_else(|| ToolError::Validation(format!("Invalid simulation type: {input}")))
    }
}

/// Entry of the simulation table shown next to each rendered image.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub fn simulation_types() -> Vec<SimulationInfo> {
    SimulationType::ALL
        .into_iter()
        .map(|kind| SimulationInfo {
            id: kind.id(),
            name: kind.label(),
            description: kind.description(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatedImage {
    pub width: u32,
    pub height: u32,
    pub data_url: String,
}

pub fn simulate_color(hex: &str, kind: SimulationType) -> Option<String> {
    hex_to_rgb(hex).map(|rgb| rgb_to_hex(simulate_rgb(rgb, kind)))
}

pub fn simulate_rgb(rgb: Rgb, kind: SimulationType) -> Rgb {
    match kind.model() {
        None => {
            let luma =
                0.299 * f64::from(rgb.r) + 0.587 * f64::from(rgb.g) + 0.114 * f64::from(rgb.b);
            let grey = to_byte(luma);
            Rgb::new(grey, grey, grey)
        }
        Some((line, anomalous)) => {
            let sim = dichromat(rgb, line);
            if anomalous {
                let blend = |orig: u8, sim: f64| {
                    to_byte((ANOMALY_WEIGHT * sim + f64::from(orig)) / (ANOMALY_WEIGHT + 1.0))
                };
                Rgb::new(blend(rgb.r, sim[0]), blend(rgb.g, sim[1]), blend(rgb.b, sim[2]))
            } else {
                Rgb::new(to_byte(sim[0]), to_byte(sim[1]), to_byte(sim[2]))
            }
        }
    }
}

/// Returns the simulated colour as unrounded 0..=255 channels.
fn dichromat(rgb: Rgb, line: &ConfusionLine) -> [f64; 3] {
    let linear = [rgb.r, rgb.g, rgb.b].map(|c| (f64::from(c) / 255.0).powf(GAMMA));
    let [x, y, z] = mul(&RGB_TO_XYZ, linear);
    if y <= 0.0 {
        return [0.0; 3];
    }
    let sum = x + y + z;
    let (u, v) = (x / sum, y / sum);

    // Neutral grey with the same luminance.
    let neutral_x = 0.312713 * y / 0.329016;
    let neutral_z = 0.358271 * y / 0.329016;

    let slope = if u < line.x {
        (line.y - v) / (line.x - u)
    } else {
        (v - line.y) / (u - line.x)
    };
    let intercept = v - u * slope;
    let du = (line.yi - intercept) / (slope - line.m);
    let dv = slope * du + intercept;

    let (sim_x, sim_z) = if dv.abs() > f64::EPSILON && du.is_finite() && dv.is_finite() {
        (du * y / dv, (1.0 - (du + dv)) * y / dv)
    } else {
        (neutral_x, neutral_z)
    };
    let sim = mul(&XYZ_TO_RGB, [sim_x, y, sim_z]);
    let toward_neutral = mul(&XYZ_TO_RGB, [neutral_x - sim_x, 0.0, neutral_z - sim_z]);

    // Largest in-range shift toward neutral that brings each channel into gamut.
    let adjust = (0..3)
        .map(|i| {
            if toward_neutral[i] == 0.0 {
                return 0.0;
            }
            let target = if sim[i] < 0.0 { 0.0 } else { 1.0 };
            let ratio = (target - sim[i]) / toward_neutral[i];
            if (0.0..=1.0).contains(&ratio) { ratio } else { 0.0 }
        })
        .fold(0.0_f64, f64::max);

    std::array::from_fn(|i| {
        let channel = sim[i] + adjust * toward_neutral[i];
        if !channel.is_finite() || channel <= 0.0 {
            0.0
        } else {
            255.0 * channel.min(1.0).powf(1.0 / GAMMA)
        }
    })
}

fn mul(m: &[f64; 9], v: [f64; 3]) -> [f64; 3] {
    [
        v[0] * m[0] + v[1] * m[3] + v[2] * m[6],
        v[0] * m[1] + v[1] * m[4] + v[2] * m[7],
        v[0] * m[2] + v[1] * m[5] + v[2] * m[8],
    ]
}

fn to_byte(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Applies the simulation to every pixel; alpha is copied untouched.
pub fn simulate_color_blindness(pixels: &PixelBuffer, kind: SimulationType) -> PixelBuffer {
    let mut data = pixels.data.clone();
    for px in data.chunks_exact_mut(4) {
        let out = simulate_rgb(Rgb::new(px[0], px[1], px[2]), kind);
        px[0] = out.r;
        px[1] = out.g;
        px[2] = out.b;
    }
    PixelBuffer {
        width: pixels.width,
        height: pixels.height,
        data,
    }
}

/// Reads and decodes an uploaded image, simulates `kind` and re-encodes it as a PNG data URL.
pub async fn simulate_image<R>(source: R, kind: SimulationType) -> Result<SimulatedImage, ToolError>
where
    R: AsyncRead + Unpin,
{
    let bytes = source::read_all(source).await?;
    let pixels = images::decode_pixels(&bytes)?;
    debug!(
        width = pixels.width,
        height = pixels.height,
        kind = kind.id(),
        "simulate color blindness"
    );
    let simulated = simulate_color_blindness(&pixels, kind);
    Ok(SimulatedImage {
        width: simulated.width,
        height: simulated.height,
        data_url: images::encode_png_data_url(&simulated)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use futures::executor::block_on;
    use futures::io::Cursor;

    #[test]
    fn black_stays_black_for_every_type() {
        for kind in SimulationType::ALL {
            assert_eq!(simulate_color("#000000", kind).as_deref(), Some("#000000"), "{kind:?}");
        }
    }

    #[test]
    fn achromatopsia_is_grey() {
        let out = simulate_rgb(Rgb::new(200, 40, 90), SimulationType::Achromatopsia);
        assert_eq!(out.r, out.g);
        assert_eq!(out.g, out.b);
        assert_eq!(
            simulate_color("#ffffff", SimulationType::Achromatopsia).as_deref(),
            Some("#ffffff")
        );
    }

    #[test]
    fn dichromats_collapse_red_green_contrast() {
        let red = simulate_rgb(Rgb::new(255, 0, 0), SimulationType::Protanopia);
        let green = simulate_rgb(Rgb::new(0, 255, 0), SimulationType::Protanopia);
        // Both land on the yellow/blue axis: red and green channels stay close.
        assert!(red.r.abs_diff(red.g) < 60, "{red:?}");
        assert!(green.r.abs_diff(green.g) < 60, "{green:?}");
    }

    #[test]
    fn anomalies_sit_between_original_and_dichromat() {
        let pairs = [
            (SimulationType::Protanomaly, SimulationType::Protanopia),
            (SimulationType::Deuteranomaly, SimulationType::Deuteranopia),
            (SimulationType::Tritanomaly, SimulationType::Tritanopia),
        ];
        let original = Rgb::new(220, 80, 40);
        for (weak, blind) in pairs {
            let anomalous = simulate_rgb(original, weak);
            let dichromat = simulate_rgb(original, blind);
            for (o, d, a) in [
                (original.r, dichromat.r, anomalous.r),
                (original.g, dichromat.g, anomalous.g),
                (original.b, dichromat.b, anomalous.b),
            ] {
                assert!(a >= o.min(d).saturating_sub(1) && a <= o.max(d).saturating_add(1));
            }
        }
    }

    #[test]
    fn buffer_simulation_preserves_alpha_and_size() {
        let pixels = PixelBuffer::new(2, 1, vec![255, 0, 0, 10, 0, 0, 255, 200]).unwrap();
        let out = simulate_color_blindness(&pixels, SimulationType::Deuteranopia);
        assert_eq!((out.width, out.height), (2, 1));
        assert_eq!(out.data.len(), pixels.data.len());
        assert_eq!(out.data[3], 10);
        assert_eq!(out.data[7], 200);
        let first = Rgb::new(out.data[0], out.data[1], out.data[2]);
        assert_eq!(first, simulate_rgb(Rgb::new(255, 0, 0), SimulationType::Deuteranopia));
    }

    #[test]
    fn simulation_type_names() {
        assert_eq!("Tritanomaly".parse::<SimulationType>().unwrap(), SimulationType::Tritanomaly);
        assert_eq!(
            "sepia".parse::<SimulationType>().unwrap_err().kind(),
            ErrorKind::Validation
        );
        let table = simulation_types();
        assert_eq!(table.len(), 7);
        assert_eq!(table[6].id, "achromatopsia");
    }

    #[test]
    fn image_pipeline_returns_png_data_url() {
        let png = images::test_support::png_fixture(3, 2);
        let result =
            block_on(simulate_image(Cursor::new(png), SimulationType::Achromatopsia)).unwrap();
        assert_eq!((result.width, result.height), (3, 2));
        assert!(result.data_url.starts_with("data:image/png;base64,"));

        let garbage = Cursor::new(b"not an image".to_vec());
        let err = block_on(simulate_image(garbage, SimulationType::Protanopia)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Processing);
    }
}
