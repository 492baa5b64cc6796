//! LZ77 dictionary matching.
//!
//! For each position, the matcher searches the preceding window for the
//! longest earlier occurrence of the upcoming bytes and either:
//! - Emits a literal byte if no match of `min_match` or more bytes exists
//! - Emits a (length, distance) pair and skips past the matched bytes
//!
//! Candidate positions come from hash chains keyed on the next three bytes.
//! Chains are walked from the most recent position backwards, so among
//! matches of equal length the nearest one wins.

use log::trace;
use oxibench_core::error::{OxiBenchError, Result, try_alloc};

/// Maximum window size (32KB).
pub const WINDOW_SIZE: usize = 32768;

/// Minimum match length.
pub const MIN_MATCH: usize = 3;

/// Maximum match length.
pub const MAX_MATCH: usize = 258;

/// Size of the hash table (power of 2).
const HASH_SIZE: usize = 32768;

/// Hash mask.
const HASH_MASK: usize = HASH_SIZE - 1;

/// Empty hash slot.
const NIL: usize = usize::MAX;

/// A token produced by LZ77 compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lz77Token {
    /// A literal byte.
    Literal(u8),
    /// A back-reference to previously seen data.
    Match {
        /// Number of bytes to copy (3-258).
        length: u16,
        /// Distance back into the window (1-32768).
        distance: u16,
    },
}

impl Lz77Token {
    /// Number of input bytes this token covers.
    pub fn span(&self) -> usize {
        match self {
            Lz77Token::Literal(_) => 1,
            Lz77Token::Match { length, .. } => *length as usize,
        }
    }
}

/// Matcher parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lz77Config {
    /// How far back matches may reach (1-32768).
    pub window_size: usize,
    /// Shortest match emitted (3-258).
    pub min_match: usize,
    /// Longest match emitted (`min_match`-258).
    pub max_match: usize,
    /// Hash chain entries examined per position; 0 emits literals only.
    pub max_chain: usize,
    /// Defer a match by one byte when the next position matches longer.
    pub lazy: bool,
}

impl Lz77Config {
    /// Parameters for effort level 0-9 (levels above 9 clamp to 9).
    ///
    /// Level 0 emits literals only; level 9 walks every chain entry inside
    /// the window.
    pub fn for_level(level: u8) -> Self {
        let (max_chain, min_match, lazy) = match level.min(9) {
            0 => (0, MIN_MATCH, false),
            1 => (4, 4, false),
            2 => (8, 4, false),
            3 => (16, 4, false),
            4 => (32, 4, true),
            5 => (64, 4, true),
            6 => (128, 4, true),
            7 => (256, 3, true),
            8 => (1024, 3, true),
            _ => (WINDOW_SIZE, 3, true),
        };

        Self {
            window_size: WINDOW_SIZE,
            min_match,
            max_match: MAX_MATCH,
            max_chain,
            lazy,
        }
    }

    /// Check the parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if !(1..=WINDOW_SIZE).contains(&self.window_size) {
            return Err(OxiBenchError::invalid_parameter(
                "window_size",
                format!("expected 1..={}, got {}", WINDOW_SIZE, self.window_size),
            ));
        }
        if self.min_match < MIN_MATCH || self.max_match > MAX_MATCH || self.min_match > self.max_match
        {
            return Err(OxiBenchError::invalid_parameter(
                "match_length",
                format!(
                    "need {} <= min ({}) <= max ({}) <= {}",
                    MIN_MATCH, self.min_match, self.max_match, MAX_MATCH
                ),
            ));
        }
        Ok(())
    }
}

impl Default for Lz77Config {
    fn default() -> Self {
        Self::for_level(6)
    }
}

/// Compute hash for 3 bytes.
#[inline(always)]
fn hash(b0: u8, b1: u8, b2: u8) -> usize {
    let h = ((b0 as usize).wrapping_mul(506832829))
        ^ ((b1 as usize).wrapping_mul(2654435761) << 8)
        ^ ((b2 as usize).wrapping_mul(374761393) << 16);
    (h ^ (h >> 15)) & HASH_MASK
}

/// Hash chains over a whole input buffer.
struct HashChains<'a> {
    data: &'a [u8],
    /// Most recent position per hash.
    head: Vec<usize>,
    /// Previous position with the same hash, indexed by position.
    prev: Vec<usize>,
    /// Positions below this have been inserted.
    inserted: usize,
}

impl<'a> HashChains<'a> {
    fn new(data: &'a [u8]) -> Result<Self> {
        let mut head: Vec<usize> = try_alloc(HASH_SIZE)?;
        head.fill(NIL);
        Ok(Self {
            data,
            head,
            prev: try_alloc(data.len())?,
            inserted: 0,
        })
    }

    /// Insert every position below `end` that still has three bytes ahead.
    fn insert_until(&mut self, end: usize) {
        let last = self.data.len().saturating_sub(MIN_MATCH - 1);
        while self.inserted < end.min(last) {
            let pos = self.inserted;
            let h = hash(self.data[pos], self.data[pos + 1], self.data[pos + 2]);
            self.prev[pos] = self.head[h];
            self.head[h] = pos;
            self.inserted += 1;
        }
        self.inserted = self.inserted.max(end.min(self.data.len()));
    }

    /// Longest match at `pos` as `(length, distance)`.
    fn find_match(&self, pos: usize, config: &Lz77Config) -> Option<(usize, usize)> {
        let data = self.data;
        let max_len = config.max_match.min(data.len() - pos);
        if max_len < config.min_match || max_len < MIN_MATCH {
            return None;
        }

        let h = hash(data[pos], data[pos + 1], data[pos + 2]);
        let mut candidate = self.head[h];
        let mut best_len = config.min_match - 1;
        let mut best_dist = 0;
        let mut chain = 0;

        while candidate != NIL && chain < config.max_chain {
            let dist = pos - candidate;
            if dist > config.window_size {
                break;
            }

            // Quick rejection on the byte that would extend the best match
            if data[candidate + best_len] == data[pos + best_len] {
                let len = data[candidate..candidate + max_len]
                    .iter()
                    .zip(&data[pos..pos + max_len])
                    .take_while(|(a, b)| a == b)
                    .count();

                if len > best_len {
                    best_len = len;
                    best_dist = dist;
                    if len >= max_len {
                        break;
                    }
                }
            }

            candidate = self.prev[candidate];
            chain += 1;
        }

        (best_dist > 0).then_some((best_len, best_dist))
    }
}

/// Tokenize `data` with the given parameters.
///
/// Tokens cover the input left to right with no gaps or overlaps.
pub fn find_tokens(data: &[u8], config: &Lz77Config) -> Result<Vec<Lz77Token>> {
    config.validate()?;

    let mut tokens = Vec::new();
    tokens
        .try_reserve(data.len() / 2 + 16)
        .map_err(|_| OxiBenchError::resource_exhausted(data.len() * size_of::<Lz77Token>()))?;

    if config.max_chain == 0 || data.len() < MIN_MATCH {
        tokens.extend(data.iter().map(|&b| Lz77Token::Literal(b)));
        return Ok(tokens);
    }

    let mut chains = HashChains::new(data)?;
    let mut pos = 0;

    while pos < data.len() {
        chains.insert_until(pos);

        if let Some((length, distance)) = chains.find_match(pos, config) {
            // Lazy evaluation: take a literal if the next byte starts a longer match
            if config.lazy && length < config.max_match && pos + 1 < data.len() {
                chains.insert_until(pos + 1);
                if let Some((next_len, _)) = chains.find_match(pos + 1, config) {
                    if next_len > length + 1 {
                        tokens.push(Lz77Token::Literal(data[pos]));
                        pos += 1;
                        continue;
                    }
                }
            }

            tokens.push(Lz77Token::Match {
                length: length as u16,
                distance: distance as u16,
            });
            pos += length;
            continue;
        }

        tokens.push(Lz77Token::Literal(data[pos]));
        pos += 1;
    }

    trace!(
        "lz77: {} bytes -> {} tokens (chain {}, lazy {})",
        data.len(),
        tokens.len(),
        config.max_chain,
        config.lazy
    );

    Ok(tokens)
}

/// Append the bytes described by `tokens` to `output`.
///
/// Overlapping copies (distance < length) repeat the bytes as they are
/// produced. A distance reaching before the start of `output` fails with
/// `InvalidCode`.
pub fn replay_into(tokens: &[Lz77Token], output: &mut Vec<u8>) -> Result<()> {
    for token in tokens {
        match *token {
            Lz77Token::Literal(byte) => output.push(byte),
            Lz77Token::Match { length, distance } => {
                copy_match(output, length as usize, distance as usize, 0)?;
            }
        }
    }
    Ok(())
}

/// Reconstruct the bytes described by `tokens`.
pub fn replay(tokens: &[Lz77Token]) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(tokens.iter().map(Lz77Token::span).sum());
    replay_into(tokens, &mut output)?;
    Ok(output)
}

/// Copy `length` bytes from `distance` back, reporting `bit_position` on error.
#[inline]
pub(crate) fn copy_match(
    output: &mut Vec<u8>,
    length: usize,
    distance: usize,
    bit_position: u64,
) -> Result<()> {
    if distance == 0 || distance > output.len() {
        return Err(OxiBenchError::invalid_code(
            bit_position,
            format!(
                "distance {} exceeds {} bytes of output",
                distance,
                output.len()
            ),
        ));
    }

    let start = output.len() - distance;
    if distance >= length {
        output.extend_from_within(start..start + length);
    } else {
        for i in 0..length {
            let byte = output[start + i];
            output.push(byte);
        }
    }
    Ok(())
}

/// LZ77 encoder with a fixed configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz77Encoder {
    config: Lz77Config,
}

impl Lz77Encoder {
    /// Create a new LZ77 encoder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new LZ77 encoder with the specified compression level (0-9).
    pub fn with_level(level: u8) -> Self {
        Self {
            config: Lz77Config::for_level(level),
        }
    }

    /// Create an encoder from explicit parameters.
    pub fn with_config(config: Lz77Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Active parameters.
    pub fn config(&self) -> &Lz77Config {
        &self.config
    }

    /// Compress input data to LZ77 tokens.
    pub fn compress(&self, input: &[u8]) -> Result<Vec<Lz77Token>> {
        find_tokens(input, &self.config)
    }

    /// Compress all data at once (convenience method).
    pub fn compress_all(input: &[u8], level: u8) -> Result<Vec<Lz77Token>> {
        Self::with_level(level).compress(input)
    }
}
