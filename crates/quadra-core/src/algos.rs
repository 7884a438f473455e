//! The closed algorithm set for the rack engine
//!
//! Each engine slot runs one algorithm over three inputs (X, Y, Z) and two
//! outputs (A, B). The set is fixed, so dispatch is a plain enum match with
//! no trait objects on the audio path. Disabled channels arrive as `None`;
//! algorithms treat missing inputs as silence and skip missing outputs.
//!
//! The two per-slot value parameters (`vals`) are interpreted per algorithm:
//! constant level, adder offset, comparator tolerance, delay time.

use crate::block::Sample;

/// Identifier for a rack algorithm. The editor's select control iterates
/// these in order; persisted slot state stores the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgoId {
    Display,
    Constant,
    PrecisionAdder,
    MinMax,
    Switch,
    Comparator,
    ConstantNote,
    ComparatorNote,
    Delay,
}

impl AlgoId {
    pub const COUNT: usize = 9;

    pub const ALL: [AlgoId; Self::COUNT] = [
        AlgoId::Display,
        AlgoId::Constant,
        AlgoId::PrecisionAdder,
        AlgoId::MinMax,
        AlgoId::Switch,
        AlgoId::Comparator,
        AlgoId::ConstantNote,
        AlgoId::ComparatorNote,
        AlgoId::Delay,
    ];

    /// Out-of-range indices fall back to [`AlgoId::Display`], so stale or
    /// corrupt persisted state always loads to a working slot.
    pub fn from_index(index: usize) -> Self {
        Self::ALL.get(index).copied().unwrap_or(AlgoId::Display)
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn title(self) -> &'static str {
        match self {
            AlgoId::Display => "display",
            AlgoId::Constant => "constant",
            AlgoId::PrecisionAdder => "prec adder",
            AlgoId::MinMax => "min/max",
            AlgoId::Switch => "switch",
            AlgoId::Comparator => "compare",
            AlgoId::ConstantNote => "note const",
            AlgoId::ComparatorNote => "note compare",
            AlgoId::Delay => "delay",
        }
    }
}

/// Borrowed channel slices for one slot for one block. `None` marks a
/// disabled channel.
pub struct AlgoIo<'a> {
    pub x: Option<&'a [Sample]>,
    pub y: Option<&'a [Sample]>,
    pub z: Option<&'a [Sample]>,
    pub a: Option<&'a mut [Sample]>,
    pub b: Option<&'a mut [Sample]>,
}

/// One volt per octave over the +-1.0 (= +-5V) signal range gives 60
/// semitones per unit.
fn quantize_semitone(v: Sample) -> Sample {
    (v * 60.0).round() / 60.0
}

fn at(src: Option<&[Sample]>, i: usize) -> Sample {
    src.map_or(0.0, |s| s[i])
}

/// Longest delay reachable at the top of the delay-time parameter.
const MAX_DELAY_SECS: f64 = 1.0;

/// A running algorithm instance. Swapping algorithms constructs a fresh one;
/// nothing carries over between variants.
pub enum Algo {
    Display,
    Constant,
    PrecisionAdder,
    MinMax,
    Switch,
    Comparator,
    ConstantNote,
    ComparatorNote,
    Delay { ring: Vec<Sample>, write: usize },
}

impl Algo {
    pub fn new(id: AlgoId) -> Self {
        match id {
            AlgoId::Display => Algo::Display,
            AlgoId::Constant => Algo::Constant,
            AlgoId::PrecisionAdder => Algo::PrecisionAdder,
            AlgoId::MinMax => Algo::MinMax,
            AlgoId::Switch => Algo::Switch,
            AlgoId::Comparator => Algo::Comparator,
            AlgoId::ConstantNote => Algo::ConstantNote,
            AlgoId::ComparatorNote => Algo::ComparatorNote,
            AlgoId::Delay => Algo::Delay {
                ring: Vec::new(),
                write: 0,
            },
        }
    }

    pub fn id(&self) -> AlgoId {
        match self {
            Algo::Display => AlgoId::Display,
            Algo::Constant => AlgoId::Constant,
            Algo::PrecisionAdder => AlgoId::PrecisionAdder,
            Algo::MinMax => AlgoId::MinMax,
            Algo::Switch => AlgoId::Switch,
            Algo::Comparator => AlgoId::Comparator,
            Algo::ConstantNote => AlgoId::ConstantNote,
            Algo::ComparatorNote => AlgoId::ComparatorNote,
            Algo::Delay { .. } => AlgoId::Delay,
        }
    }

    /// Size scratch storage. Only the delay has any; its ring covers
    /// [`MAX_DELAY_SECS`] at the given rate.
    pub fn prepare(&mut self, sample_rate: f64, _max_frames: usize) {
        if let Algo::Delay { ring, write } = self {
            let len = ((sample_rate * MAX_DELAY_SECS) as usize).max(1);
            ring.clear();
            ring.resize(len, 0.0);
            *write = 0;
        }
    }

    pub fn process(&mut self, io: AlgoIo<'_>, vals: [f32; 2], frames: usize) {
        let AlgoIo {
            x,
            y,
            z,
            mut a,
            mut b,
        } = io;
        match self {
            Algo::Display => {
                // Scope view: channels pass straight through.
                if let Some(a) = a {
                    for i in 0..frames {
                        a[i] = at(x, i);
                    }
                }
                if let Some(b) = b {
                    for i in 0..frames {
                        b[i] = at(y, i);
                    }
                }
            }
            Algo::Constant => {
                if let Some(a) = a {
                    a[..frames].fill(vals[0]);
                }
                if let Some(b) = b {
                    for i in 0..frames {
                        b[i] = at(x, i);
                    }
                }
            }
            Algo::PrecisionAdder => {
                for i in 0..frames {
                    let sum = at(x, i) + at(y, i) + at(z, i) + vals[0];
                    if let Some(a) = a.as_deref_mut() {
                        a[i] = sum;
                    }
                    if let Some(b) = b.as_deref_mut() {
                        b[i] = -sum;
                    }
                }
            }
            Algo::MinMax => {
                for i in 0..frames {
                    let (xi, yi) = (at(x, i), at(y, i));
                    if let Some(a) = a.as_deref_mut() {
                        a[i] = xi.min(yi);
                    }
                    if let Some(b) = b.as_deref_mut() {
                        b[i] = xi.max(yi);
                    }
                }
            }
            Algo::Switch => {
                // Z picks which input lands on A; the other goes to B.
                for i in 0..frames {
                    let (xi, yi) = (at(x, i), at(y, i));
                    let (sel, rest) = if at(z, i) > 0.5 { (yi, xi) } else { (xi, yi) };
                    if let Some(a) = a.as_deref_mut() {
                        a[i] = sel;
                    }
                    if let Some(b) = b.as_deref_mut() {
                        b[i] = rest;
                    }
                }
            }
            Algo::Comparator => {
                let tolerance = vals[0].max(0.0);
                for i in 0..frames {
                    let within = (at(x, i) - at(y, i)).abs() <= tolerance;
                    if let Some(a) = a.as_deref_mut() {
                        a[i] = if within { 1.0 } else { 0.0 };
                    }
                    if let Some(b) = b.as_deref_mut() {
                        b[i] = if within { 0.0 } else { 1.0 };
                    }
                }
            }
            Algo::ConstantNote => {
                let note = quantize_semitone(vals[0]);
                if let Some(a) = a {
                    a[..frames].fill(note);
                }
                if let Some(b) = b {
                    for i in 0..frames {
                        b[i] = quantize_semitone(at(x, i));
                    }
                }
            }
            Algo::ComparatorNote => {
                // Same gate as the plain comparator, but over quantized
                // pitches so detuned inputs on the same semitone match.
                for i in 0..frames {
                    let same =
                        quantize_semitone(at(x, i)) == quantize_semitone(at(y, i));
                    if let Some(a) = a.as_deref_mut() {
                        a[i] = if same { 1.0 } else { 0.0 };
                    }
                    if let Some(b) = b.as_deref_mut() {
                        b[i] = if same { 0.0 } else { 1.0 };
                    }
                }
            }
            Algo::Delay { ring, write } => {
                if ring.is_empty() {
                    return;
                }
                let len = ring.len();
                let delay = (vals[0].clamp(0.0, 1.0) * (len - 1) as f32) as usize;
                for i in 0..frames {
                    let xi = at(x, i);
                    ring[*write] = xi;
                    let delayed = ring[(*write + len - delay) % len];
                    *write = (*write + 1) % len;
                    if let Some(a) = a.as_deref_mut() {
                        a[i] = delayed;
                    }
                    if let Some(b) = b.as_deref_mut() {
                        b[i] = xi;
                    }
                }
            }
        }
    }
}
