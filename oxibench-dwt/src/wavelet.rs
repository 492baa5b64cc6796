//! Multi-level 2D discrete wavelet transform.
//!
//! Filter banks come from a closed registry of named families. Each level
//! filters the rows, then the columns, of the running approximation with
//! periodic extension, halving both dimensions (rounding up). Odd lengths are
//! first extended by repeating the last sample; the inverse crops the extra
//! sample back off, so reconstruction is exact up to floating point error.
//!
//! ```text
//!            rows               columns
//!  plane ──► lo │ hi  ──►  LL │ HL      approximation │ vertical
//!                          ───┼───  =   ──────────────┼──────────
//!                          LH │ HH      horizontal    │ diagonal
//! ```

use log::trace;
use oxibench_core::error::{OxiBenchError, Result};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

const HAAR: [f64; 2] = [std::f64::consts::FRAC_1_SQRT_2, std::f64::consts::FRAC_1_SQRT_2];

const DB2: [f64; 4] = [
    -0.12940952255126037,
    0.22414386804201339,
    0.8365163037378079,
    0.48296291314453416,
];

const DB3: [f64; 6] = [
    0.03522629188570953,
    -0.08544127388202666,
    -0.13501102001025458,
    0.45987750211849154,
    0.8068915093110925,
    0.33267055295008263,
];

const DB4: [f64; 8] = [
    -0.010597401785069032,
    0.0328830116668852,
    0.030841381835560764,
    -0.18703481171909309,
    -0.027983769416859854,
    0.6308807679298589,
    0.7148465705529157,
    0.2303778133088965,
];

const SYM4: [f64; 8] = [
    -0.07576571478927333,
    -0.02963552764599851,
    0.49761866763201545,
    0.8037387518059161,
    0.29785779560527736,
    -0.09921954357684722,
    -0.012603967262037833,
    0.0322231006040427,
];

const COIF1: [f64; 6] = [
    -0.01565572813546454,
    -0.0727326195128539,
    0.38486484686420286,
    0.8525720202122554,
    0.3378976624578092,
    -0.0727326195128539,
];

// Biorthogonal banks: dec_lo, dec_hi, rec_lo, rec_hi
const BIOR22: [[f64; 6]; 4] = [
    [
        0.0,
        -0.17677669529663687,
        0.35355339059327373,
        1.0606601717798212,
        0.35355339059327373,
        -0.17677669529663687,
    ],
    [
        0.0,
        0.35355339059327373,
        -0.7071067811865475,
        0.35355339059327373,
        0.0,
        0.0,
    ],
    [
        0.0,
        0.35355339059327373,
        0.7071067811865475,
        0.35355339059327373,
        0.0,
        0.0,
    ],
    [
        0.0,
        0.17677669529663687,
        0.35355339059327373,
        -1.0606601717798212,
        0.35355339059327373,
        0.17677669529663687,
    ],
];

const BIOR44: [[f64; 10]; 4] = [
    [
        0.0,
        0.03782845550726404,
        -0.023849465019556843,
        -0.11062440441843718,
        0.37740285561283066,
        0.8526986790088938,
        0.37740285561283066,
        -0.11062440441843718,
        -0.023849465019556843,
        0.03782845550726404,
    ],
    [
        0.0,
        -0.06453888262869706,
        0.04068941760916406,
        0.41809227322161724,
        -0.7884856164055829,
        0.41809227322161724,
        0.04068941760916406,
        -0.06453888262869706,
        0.0,
        0.0,
    ],
    [
        0.0,
        -0.06453888262869706,
        -0.04068941760916406,
        0.41809227322161724,
        0.7884856164055829,
        0.41809227322161724,
        -0.04068941760916406,
        -0.06453888262869706,
        0.0,
        0.0,
    ],
    [
        0.0,
        -0.03782845550726404,
        -0.023849465019556843,
        0.11062440441843718,
        0.37740285561283066,
        -0.8526986790088938,
        0.37740285561283066,
        0.11062440441843718,
        -0.023849465019556843,
        -0.03782845550726404,
    ],
];

/// Analysis and synthesis filters of one wavelet.
///
/// All four filters have the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterBank {
    /// Analysis low-pass filter.
    pub dec_lo: Vec<f64>,
    /// Analysis high-pass filter.
    pub dec_hi: Vec<f64>,
    /// Synthesis low-pass filter.
    pub rec_lo: Vec<f64>,
    /// Synthesis high-pass filter.
    pub rec_hi: Vec<f64>,
}

impl FilterBank {
    /// Derive the quadrature mirror bank of an orthogonal scaling filter.
    pub fn orthogonal(scaling: &[f64]) -> Self {
        let rec_lo: Vec<f64> = scaling.iter().rev().copied().collect();
        let rec_hi: Vec<f64> = scaling
            .iter()
            .enumerate()
            .map(|(j, &c)| if j % 2 == 0 { c } else { -c })
            .collect();
        let dec_hi = rec_hi.iter().rev().copied().collect();

        Self {
            dec_lo: scaling.to_vec(),
            dec_hi,
            rec_lo,
            rec_hi,
        }
    }

    /// Wrap a tabulated biorthogonal bank.
    pub fn biorthogonal(dec_lo: &[f64], dec_hi: &[f64], rec_lo: &[f64], rec_hi: &[f64]) -> Self {
        Self {
            dec_lo: dec_lo.to_vec(),
            dec_hi: dec_hi.to_vec(),
            rec_lo: rec_lo.to_vec(),
            rec_hi: rec_hi.to_vec(),
        }
    }

    /// Filter length.
    pub fn len(&self) -> usize {
        self.dec_lo.len()
    }

    /// Always false for registry banks.
    pub fn is_empty(&self) -> bool {
        self.dec_lo.is_empty()
    }
}

/// Registry banks, shared between aliases.
fn bank_table() -> &'static [FilterBank; 8] {
    static BANKS: OnceLock<[FilterBank; 8]> = OnceLock::new();

    BANKS.get_or_init(|| {
        [
            FilterBank::orthogonal(&HAAR),
            FilterBank::orthogonal(&DB2),
            FilterBank::orthogonal(&DB3),
            FilterBank::orthogonal(&DB4),
            FilterBank::orthogonal(&SYM4),
            FilterBank::orthogonal(&COIF1),
            FilterBank::biorthogonal(&BIOR22[0], &BIOR22[1], &BIOR22[2], &BIOR22[3]),
            FilterBank::biorthogonal(&BIOR44[0], &BIOR44[1], &BIOR44[2], &BIOR44[3]),
        ]
    })
}

/// Named wavelet families.
///
/// Aliases (`db1`, `bior1.1` for Haar; `sym2`, `sym3` for `db2`, `db3`) keep
/// their own variant so results stay labelled with the name that was asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WaveletFamily {
    /// Haar.
    Haar,
    /// Daubechies 1 (Haar).
    Db1,
    /// Daubechies 2.
    Db2,
    /// Daubechies 3.
    Db3,
    /// Daubechies 4.
    Db4,
    /// Symlet 2 (same filter as `db2`).
    Sym2,
    /// Symlet 3 (same filter as `db3`).
    Sym3,
    /// Symlet 4.
    Sym4,
    /// Coiflet 1.
    Coif1,
    /// Biorthogonal 1.1 (Haar).
    Bior11,
    /// Biorthogonal 2.2.
    Bior22,
    /// Biorthogonal 4.4.
    Bior44,
}

impl WaveletFamily {
    /// Every registered family, in id order.
    pub const ALL: [WaveletFamily; 12] = [
        Self::Haar,
        Self::Db1,
        Self::Db2,
        Self::Db3,
        Self::Db4,
        Self::Sym2,
        Self::Sym3,
        Self::Sym4,
        Self::Coif1,
        Self::Bior11,
        Self::Bior22,
        Self::Bior44,
    ];

    /// Registry name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Haar => "haar",
            Self::Db1 => "db1",
            Self::Db2 => "db2",
            Self::Db3 => "db3",
            Self::Db4 => "db4",
            Self::Sym2 => "sym2",
            Self::Sym3 => "sym3",
            Self::Sym4 => "sym4",
            Self::Coif1 => "coif1",
            Self::Bior11 => "bior1.1",
            Self::Bior22 => "bior2.2",
            Self::Bior44 => "bior4.4",
        }
    }

    /// Look a family up by name (case-insensitive).
    pub fn from_name(name: &str) -> Result<Self> {
        let wanted = name.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|family| family.name() == wanted)
            .ok_or_else(|| OxiBenchError::unsupported_wavelet(name))
    }

    /// Stable one-byte id used in stream headers.
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Family for a stream header id.
    pub fn from_id(id: u8) -> Result<Self> {
        Self::ALL
            .get(id as usize)
            .copied()
            .ok_or_else(|| OxiBenchError::invalid_header(format!("unknown wavelet id {}", id)))
    }

    /// Filter bank of this family.
    pub fn filter_bank(self) -> &'static FilterBank {
        let index = match self {
            Self::Haar | Self::Db1 | Self::Bior11 => 0,
            Self::Db2 | Self::Sym2 => 1,
            Self::Db3 | Self::Sym3 => 2,
            Self::Db4 => 3,
            Self::Sym4 => 4,
            Self::Coif1 => 5,
            Self::Bior22 => 6,
            Self::Bior44 => 7,
        };
        &bank_table()[index]
    }

    /// Filter length.
    pub fn filter_len(self) -> usize {
        self.filter_bank().len()
    }

    /// Whether the synthesis filters are the time-reversed analysis filters.
    pub fn is_orthogonal(self) -> bool {
        !matches!(self, Self::Bior22 | Self::Bior44)
    }

    /// Deepest useful decomposition for a signal of `len` samples.
    ///
    /// `floor(log2(len / (filter_len - 1)))`, or 0 when the filter is longer
    /// than the signal.
    pub fn max_level(self, len: usize) -> usize {
        let ratio = len / (self.filter_len() - 1);
        if ratio == 0 {
            0
        } else {
            ratio.ilog2() as usize
        }
    }
}

impl fmt::Display for WaveletFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WaveletFamily {
    type Err = OxiBenchError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

/// Row-major 2D array of coefficients.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    width: usize,
    height: usize,
    data: Vec<f64>,
}

impl Plane {
    /// Wrap `data` as a `width × height` plane.
    pub fn new(width: usize, height: usize, data: Vec<f64>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(OxiBenchError::invalid_parameter(
                "plane",
                format!("plane must be non-empty, got {}x{}", width, height),
            ));
        }
        if data.len() != width * height {
            return Err(OxiBenchError::invalid_parameter(
                "plane",
                format!(
                    "{}x{} needs {} values, got {}",
                    width,
                    height,
                    width * height,
                    data.len()
                ),
            ));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Plane of zeros.
    fn zeros(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    /// Plane holding 8-bit samples as floats.
    pub fn from_samples(width: usize, height: usize, samples: &[u8]) -> Result<Self> {
        Self::new(width, height, samples.iter().map(|&s| f64::from(s)).collect())
    }

    /// Width.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height.
    pub fn height(&self) -> usize {
        self.height
    }

    /// `(width, height)`.
    pub fn dims(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Values in row-major order.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Take the values out.
    pub fn into_data(self) -> Vec<f64> {
        self.data
    }

    /// Value at `(x, y)`.
    pub fn get(&self, x: usize, y: usize) -> f64 {
        self.data[y * self.width + x]
    }

    fn row(&self, y: usize) -> &[f64] {
        &self.data[y * self.width..(y + 1) * self.width]
    }

    fn row_mut(&mut self, y: usize) -> &mut [f64] {
        &mut self.data[y * self.width..(y + 1) * self.width]
    }

    fn column_into(&self, x: usize, out: &mut Vec<f64>) {
        out.clear();
        out.extend((0..self.height).map(|y| self.data[y * self.width + x]));
    }

    fn set_column(&mut self, x: usize, values: &[f64]) {
        for (y, &v) in values.iter().enumerate() {
            self.data[y * self.width + x] = v;
        }
    }

    /// Round to the nearest integer and clamp into `0..=255`.
    pub fn to_samples(&self) -> Vec<u8> {
        self.data
            .iter()
            .map(|&v| v.round().clamp(0.0, 255.0) as u8)
            .collect()
    }

    /// Apply `f` to every value.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }
}

/// Detail subbands produced by one decomposition level.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailLevel {
    /// Low-pass along rows, high-pass along columns.
    pub horizontal: Plane,
    /// High-pass along rows, low-pass along columns.
    pub vertical: Plane,
    /// High-pass in both directions.
    pub diagonal: Plane,
}

/// Subband coefficients of a multi-level transform.
#[derive(Debug, Clone, PartialEq)]
pub struct Decomposition {
    family: WaveletFamily,
    width: usize,
    height: usize,
    approximation: Plane,
    /// Coarsest level first.
    details: Vec<DetailLevel>,
}

/// Size of the approximation after one level.
#[inline]
fn halved(len: usize) -> usize {
    len.div_ceil(2)
}

/// Subband shapes of a `levels`-deep transform of a `width × height` plane.
///
/// Order: approximation, then for each level coarse to fine the horizontal,
/// vertical and diagonal subbands.
pub fn subband_layout(width: usize, height: usize, levels: usize) -> Vec<(usize, usize)> {
    let mut dims = Vec::with_capacity(levels);
    let (mut w, mut h) = (width, height);
    for _ in 0..levels {
        w = halved(w);
        h = halved(h);
        dims.push((w, h));
    }

    let mut layout = Vec::with_capacity(1 + 3 * levels);
    layout.push(dims.last().copied().unwrap_or((width, height)));
    for &shape in dims.iter().rev() {
        layout.extend([shape; 3]);
    }
    layout
}

impl Decomposition {
    /// Reassemble a decomposition from subbands in [`subband_layout`] order.
    pub fn from_subbands(
        family: WaveletFamily,
        width: usize,
        height: usize,
        levels: usize,
        subbands: Vec<Plane>,
    ) -> Result<Self> {
        let layout = subband_layout(width, height, levels);
        if subbands.len() != layout.len() {
            return Err(OxiBenchError::invalid_parameter(
                "subbands",
                format!("expected {} subbands, got {}", layout.len(), subbands.len()),
            ));
        }
        if let Some((i, band)) = subbands
            .iter()
            .enumerate()
            .find(|(i, band)| band.dims() != layout[*i])
        {
            return Err(OxiBenchError::invalid_parameter(
                "subbands",
                format!(
                    "subband {} is {}x{}, expected {}x{}",
                    i,
                    band.width(),
                    band.height(),
                    layout[i].0,
                    layout[i].1
                ),
            ));
        }

        let mut bands = subbands.into_iter();
        let approximation = bands
            .next()
            .ok_or_else(|| OxiBenchError::invalid_parameter("subbands", "missing approximation"))?;
        let mut details = Vec::with_capacity(levels);
        while let (Some(horizontal), Some(vertical), Some(diagonal)) =
            (bands.next(), bands.next(), bands.next())
        {
            details.push(DetailLevel {
                horizontal,
                vertical,
                diagonal,
            });
        }

        Ok(Self {
            family,
            width,
            height,
            approximation,
            details,
        })
    }

    /// Wavelet family used.
    pub fn family(&self) -> WaveletFamily {
        self.family
    }

    /// Number of levels.
    pub fn levels(&self) -> usize {
        self.details.len()
    }

    /// Size of the transformed plane.
    pub fn dims(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Coarsest approximation.
    pub fn approximation(&self) -> &Plane {
        &self.approximation
    }

    /// Detail levels, coarsest first.
    pub fn details(&self) -> &[DetailLevel] {
        &self.details
    }

    /// Subbands in [`subband_layout`] order.
    pub fn subbands(&self) -> impl Iterator<Item = &Plane> {
        std::iter::once(&self.approximation).chain(
            self.details
                .iter()
                .flat_map(|d| [&d.horizontal, &d.vertical, &d.diagonal]),
        )
    }

    /// Total number of coefficients.
    pub fn coefficient_count(&self) -> usize {
        self.subbands().map(|p| p.data().len()).sum()
    }

    /// Apply `f` to every coefficient of every subband.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            family: self.family,
            width: self.width,
            height: self.height,
            approximation: self.approximation.map(&f),
            details: self
                .details
                .iter()
                .map(|d| DetailLevel {
                    horizontal: d.horizontal.map(&f),
                    vertical: d.vertical.map(&f),
                    diagonal: d.diagonal.map(&f),
                })
                .collect(),
        }
    }
}

/// One-level 1D analysis with periodic extension.
///
/// `lo` and `hi` receive `ceil(x.len() / 2)` coefficients each.
fn analyze(x: &[f64], bank: &FilterBank, scratch: &mut Vec<f64>, lo: &mut [f64], hi: &mut [f64]) {
    scratch.clear();
    scratch.extend_from_slice(x);
    if x.len() % 2 == 1 {
        scratch.push(x[x.len() - 1]);
    }

    let n = scratch.len();
    let taps = bank.len();
    for k in 0..n / 2 {
        let mut a = 0.0;
        let mut d = 0.0;
        for i in 0..taps {
            let s = scratch[(2 * k + i) % n];
            a += bank.dec_lo[taps - 1 - i] * s;
            d += bank.dec_hi[taps - 1 - i] * s;
        }
        lo[k] = a;
        hi[k] = d;
    }
}

/// One-level 1D synthesis, cropped to `out.len()` samples.
fn synthesize(lo: &[f64], hi: &[f64], bank: &FilterBank, scratch: &mut Vec<f64>, out: &mut [f64]) {
    let n = 2 * lo.len();
    scratch.clear();
    scratch.resize(n, 0.0);

    let taps = bank.len();
    for (k, (&a, &d)) in lo.iter().zip(hi).enumerate() {
        for j in 0..taps {
            scratch[(2 * k + j) % n] += a * bank.rec_lo[j] + d * bank.rec_hi[j];
        }
    }
    out.copy_from_slice(&scratch[..out.len()]);
}

/// Split a plane into its approximation and three detail subbands.
fn forward_level(plane: &Plane, bank: &FilterBank) -> (Plane, DetailLevel) {
    let (w, h) = plane.dims();
    let (hw, hh) = (halved(w), halved(h));
    let mut scratch = Vec::with_capacity(w.max(h) + 1);

    // Rows
    let mut low = Plane::zeros(hw, h);
    let mut high = Plane::zeros(hw, h);
    for y in 0..h {
        let (lo_row, hi_row) = (&mut low.data[y * hw..(y + 1) * hw], &mut high.data[y * hw..(y + 1) * hw]);
        analyze(plane.row(y), bank, &mut scratch, lo_row, hi_row);
    }

    // Columns
    let mut column = Vec::with_capacity(h);
    let mut col_lo = vec![0.0; hh];
    let mut col_hi = vec![0.0; hh];
    let mut split_columns = |source: &Plane| {
        let mut lo_plane = Plane::zeros(hw, hh);
        let mut hi_plane = Plane::zeros(hw, hh);
        for x in 0..hw {
            source.column_into(x, &mut column);
            analyze(&column, bank, &mut scratch, &mut col_lo, &mut col_hi);
            lo_plane.set_column(x, &col_lo);
            hi_plane.set_column(x, &col_hi);
        }
        (lo_plane, hi_plane)
    };
    let (approximation, horizontal) = split_columns(&low);
    let (vertical, diagonal) = split_columns(&high);

    (
        approximation,
        DetailLevel {
            horizontal,
            vertical,
            diagonal,
        },
    )
}

/// Merge an approximation and its detail subbands into a `width × height` plane.
fn inverse_level(
    approximation: &Plane,
    detail: &DetailLevel,
    bank: &FilterBank,
    width: usize,
    height: usize,
) -> Plane {
    let (hw, hh) = approximation.dims();
    let mut scratch = Vec::with_capacity(2 * hw.max(hh));

    // Columns
    let mut lo_col = Vec::with_capacity(hh);
    let mut hi_col = Vec::with_capacity(hh);
    let mut column = vec![0.0; height];
    let mut merge_columns = |lo_plane: &Plane, hi_plane: &Plane| {
        let mut merged = Plane::zeros(hw, height);
        for x in 0..hw {
            lo_plane.column_into(x, &mut lo_col);
            hi_plane.column_into(x, &mut hi_col);
            synthesize(&lo_col, &hi_col, bank, &mut scratch, &mut column);
            merged.set_column(x, &column);
        }
        merged
    };
    let low = merge_columns(approximation, &detail.horizontal);
    let high = merge_columns(&detail.vertical, &detail.diagonal);

    // Rows
    let mut output = Plane::zeros(width, height);
    for y in 0..height {
        synthesize(low.row(y), high.row(y), bank, &mut scratch, output.row_mut(y));
    }
    output
}

/// Decompose `plane` into `levels` levels of subbands.
///
/// Fails with `InvalidParameter` when `levels` is 0 or deeper than
/// [`WaveletFamily::max_level`] allows for the smaller dimension.
pub fn forward(plane: &Plane, family: WaveletFamily, levels: usize) -> Result<Decomposition> {
    let (width, height) = plane.dims();
    if levels == 0 {
        return Err(OxiBenchError::invalid_parameter(
            "levels",
            "at least one decomposition level is required",
        ));
    }
    let max = family.max_level(width.min(height));
    if levels > max {
        return Err(OxiBenchError::invalid_parameter(
            "levels",
            format!(
                "{} levels requested, {} supports at most {} for {}x{}",
                levels, family, max, width, height
            ),
        ));
    }

    let bank = family.filter_bank();
    let mut approximation = plane.clone();
    let mut details = Vec::with_capacity(levels);
    for level in 0..levels {
        let (next, detail) = forward_level(&approximation, bank);
        trace!(
            "{} level {}: {}x{} -> {}x{}",
            family,
            level + 1,
            approximation.width(),
            approximation.height(),
            next.width(),
            next.height()
        );
        details.push(detail);
        approximation = next;
    }
    details.reverse();

    Ok(Decomposition {
        family,
        width,
        height,
        approximation,
        details,
    })
}

/// Reconstruct the plane a decomposition was taken from.
pub fn inverse(decomposition: &Decomposition) -> Plane {
    let bank = decomposition.family.filter_bank();

    // Sizes of each level's input, finest first
    let mut sizes = Vec::with_capacity(decomposition.levels());
    let (mut w, mut h) = decomposition.dims();
    for _ in 0..decomposition.levels() {
        sizes.push((w, h));
        w = halved(w);
        h = halved(h);
    }

    let mut approximation = decomposition.approximation.clone();
    for (detail, &(width, height)) in decomposition.details.iter().zip(sizes.iter().rev()) {
        approximation = inverse_level(&approximation, detail, bank, width, height);
    }
    approximation
}
