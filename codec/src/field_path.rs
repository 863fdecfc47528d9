//! Field paths and the opcodes that move them.

use std::fmt;
use std::ops::{Deref, DerefMut};

use bitstream::BitReader;

use crate::error::{CodecError, CodecResult};

/// Maximum nesting depth of a field path.
pub const MAX_DEPTH: usize = 7;

const RESET_TEMPLATE: [i32; MAX_DEPTH] = [-1, 0, 0, 0, 0, 0, 0];

/// A cursor into an entity's nested fields.
///
/// Indices past `last` are kept at zero so that pushes start from a clean
/// slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldPath {
    path: [i32; MAX_DEPTH],
    last: usize,
    done: bool,
}

impl Default for FieldPath {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldPath {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            path: RESET_TEMPLATE,
            last: 0,
            done: false,
        }
    }

    /// Builds a path from explicit indices.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::FieldPathOverflow`] if `indices` is empty or
    /// deeper than [`MAX_DEPTH`].
    pub fn from_indices(indices: &[i32]) -> CodecResult<Self> {
        if indices.is_empty() || indices.len() > MAX_DEPTH {
            return Err(CodecError::FieldPathOverflow {
                depth: indices.len(),
            });
        }
        let mut path = [0; MAX_DEPTH];
        path[..indices.len()].copy_from_slice(indices);
        Ok(Self {
            path,
            last: indices.len() - 1,
            done: false,
        })
    }

    /// Restores the initial `[-1, 0, ...]` state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    #[must_use]
    pub const fn last(&self) -> usize {
        self.last
    }

    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.done
    }

    /// The active indices, `path[0..=last]`.
    #[must_use]
    pub fn as_slice(&self) -> &[i32] {
        &self.path[..=self.last]
    }

    fn add(&mut self, position: usize, delta: i32) {
        self.path[position] = self.path[position].wrapping_add(delta);
    }

    fn add_last(&mut self, delta: i32) {
        self.add(self.last, delta);
    }

    fn push(&mut self, value: i32) -> CodecResult<()> {
        if self.last + 1 >= MAX_DEPTH {
            return Err(CodecError::FieldPathOverflow {
                depth: self.last + 2,
            });
        }
        self.last += 1;
        self.path[self.last] = value;
        Ok(())
    }

    fn pop(&mut self, n: usize) -> CodecResult<()> {
        if n > self.last {
            return Err(CodecError::FieldPathOverflow { depth: 0 });
        }
        for _ in 0..n {
            self.path[self.last] = 0;
            self.last -= 1;
        }
        Ok(())
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, index) in self.as_slice().iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{index}")?;
        }
        Ok(())
    }
}

/// Transforms a path in place, consuming operand bits.
pub type FieldPathOpFn = fn(&mut BitReader<'_>, &mut FieldPath) -> CodecResult<()>;

/// One field-path opcode and its static Huffman weight.
#[derive(Clone, Copy)]
pub struct FieldPathOp {
    pub name: &'static str,
    pub weight: u32,
    pub apply: FieldPathOpFn,
}

impl fmt::Debug for FieldPathOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldPathOp")
            .field("name", &self.name)
            .field("weight", &self.weight)
            .finish_non_exhaustive()
    }
}

/// Symbol of the terminating opcode.
pub const FINISH_OP: usize = 39;

fn ubv(r: &mut BitReader<'_>) -> CodecResult<i32> {
    Ok(r.read_ubitvar()? as i32)
}

fn ubvfp(r: &mut BitReader<'_>) -> CodecResult<i32> {
    Ok(r.read_ubitvar_fp()? as i32)
}

fn bits(r: &mut BitReader<'_>, n: u8) -> CodecResult<i32> {
    Ok(r.read_ubits(n)? as i32)
}

fn add_flagged(
    r: &mut BitReader<'_>,
    fp: &mut FieldPath,
    mut delta: impl FnMut(&mut BitReader<'_>) -> CodecResult<i32>,
) -> CodecResult<()> {
    for i in 0..=fp.last {
        if r.read_bit()? {
            let d = delta(r)?;
            fp.add(i, d);
        }
    }
    Ok(())
}

fn plus_one(_: &mut BitReader<'_>, fp: &mut FieldPath) -> CodecResult<()> {
    fp.add_last(1);
    Ok(())
}

fn plus_two(_: &mut BitReader<'_>, fp: &mut FieldPath) -> CodecResult<()> {
    fp.add_last(2);
    Ok(())
}

fn plus_three(_: &mut BitReader<'_>, fp: &mut FieldPath) -> CodecResult<()> {
    fp.add_last(3);
    Ok(())
}

fn plus_four(_: &mut BitReader<'_>, fp: &mut FieldPath) -> CodecResult<()> {
    fp.add_last(4);
    Ok(())
}

fn plus_n(r: &mut BitReader<'_>, fp: &mut FieldPath) -> CodecResult<()> {
    fp.add_last(ubvfp(r)?.wrapping_add(5));
    Ok(())
}

fn push_one_left_delta_zero_right_zero(_: &mut BitReader<'_>, fp: &mut FieldPath) -> CodecResult<()> {
    fp.push(0)
}

fn push_one_left_delta_zero_right_non_zero(
    r: &mut BitReader<'_>,
    fp: &mut FieldPath,
) -> CodecResult<()> {
    fp.push(ubvfp(r)?)
}

fn push_one_left_delta_one_right_zero(_: &mut BitReader<'_>, fp: &mut FieldPath) -> CodecResult<()> {
    fp.add_last(1);
    fp.push(0)
}

fn push_one_left_delta_one_right_non_zero(
    r: &mut BitReader<'_>,
    fp: &mut FieldPath,
) -> CodecResult<()> {
    fp.add_last(1);
    fp.push(ubvfp(r)?)
}

fn push_one_left_delta_n_right_zero(r: &mut BitReader<'_>, fp: &mut FieldPath) -> CodecResult<()> {
    fp.add_last(ubvfp(r)?);
    fp.push(0)
}

fn push_one_left_delta_n_right_non_zero(
    r: &mut BitReader<'_>,
    fp: &mut FieldPath,
) -> CodecResult<()> {
    fp.add_last(ubvfp(r)?.wrapping_add(2));
    fp.push(ubvfp(r)?.wrapping_add(1))
}

fn push_one_left_delta_n_right_non_zero_pack6(
    r: &mut BitReader<'_>,
    fp: &mut FieldPath,
) -> CodecResult<()> {
    fp.add_last(bits(r, 3)? + 2);
    fp.push(bits(r, 3)? + 1)
}

fn push_one_left_delta_n_right_non_zero_pack8(
    r: &mut BitReader<'_>,
    fp: &mut FieldPath,
) -> CodecResult<()> {
    fp.add_last(bits(r, 4)? + 2);
    fp.push(bits(r, 4)? + 1)
}

fn push_two_left_delta_zero(r: &mut BitReader<'_>, fp: &mut FieldPath) -> CodecResult<()> {
    fp.push(ubvfp(r)?)?;
    fp.push(ubvfp(r)?)
}

fn push_two_pack5_left_delta_zero(r: &mut BitReader<'_>, fp: &mut FieldPath) -> CodecResult<()> {
    fp.push(bits(r, 5)?)?;
    fp.push(bits(r, 5)?)
}

fn push_three_left_delta_zero(r: &mut BitReader<'_>, fp: &mut FieldPath) -> CodecResult<()> {
    fp.push(ubvfp(r)?)?;
    fp.push(ubvfp(r)?)?;
    fp.push(ubvfp(r)?)
}

fn push_three_pack5_left_delta_zero(r: &mut BitReader<'_>, fp: &mut FieldPath) -> CodecResult<()> {
    fp.push(bits(r, 5)?)?;
    fp.push(bits(r, 5)?)?;
    fp.push(bits(r, 5)?)
}

fn push_two_left_delta_one(r: &mut BitReader<'_>, fp: &mut FieldPath) -> CodecResult<()> {
    fp.add_last(1);
    push_two_left_delta_zero(r, fp)
}

fn push_two_pack5_left_delta_one(r: &mut BitReader<'_>, fp: &mut FieldPath) -> CodecResult<()> {
    fp.add_last(1);
    push_two_pack5_left_delta_zero(r, fp)
}

fn push_three_left_delta_one(r: &mut BitReader<'_>, fp: &mut FieldPath) -> CodecResult<()> {
    fp.add_last(1);
    push_three_left_delta_zero(r, fp)
}

fn push_three_pack5_left_delta_one(r: &mut BitReader<'_>, fp: &mut FieldPath) -> CodecResult<()> {
    fp.add_last(1);
    push_three_pack5_left_delta_zero(r, fp)
}

fn push_two_left_delta_n(r: &mut BitReader<'_>, fp: &mut FieldPath) -> CodecResult<()> {
    fp.add_last(ubv(r)?.wrapping_add(2));
    push_two_left_delta_zero(r, fp)
}

fn push_two_pack5_left_delta_n(r: &mut BitReader<'_>, fp: &mut FieldPath) -> CodecResult<()> {
    fp.add_last(ubv(r)?.wrapping_add(2));
    push_two_pack5_left_delta_zero(r, fp)
}

fn push_three_left_delta_n(r: &mut BitReader<'_>, fp: &mut FieldPath) -> CodecResult<()> {
    fp.add_last(ubv(r)?.wrapping_add(2));
    push_three_left_delta_zero(r, fp)
}

fn push_three_pack5_left_delta_n(r: &mut BitReader<'_>, fp: &mut FieldPath) -> CodecResult<()> {
    fp.add_last(ubv(r)?.wrapping_add(2));
    push_three_pack5_left_delta_zero(r, fp)
}

fn push_n(r: &mut BitReader<'_>, fp: &mut FieldPath) -> CodecResult<()> {
    let n = r.read_ubitvar()?;
    fp.add_last(ubv(r)?);
    for _ in 0..n {
        fp.push(ubvfp(r)?)?;
    }
    Ok(())
}

fn push_n_and_non_topological(r: &mut BitReader<'_>, fp: &mut FieldPath) -> CodecResult<()> {
    add_flagged(r, fp, |r| Ok(r.read_vars32()?.wrapping_add(1)))?;
    let count = r.read_ubitvar()?;
    for _ in 0..count {
        fp.push(ubvfp(r)?)?;
    }
    Ok(())
}

fn pop_one_plus_one(_: &mut BitReader<'_>, fp: &mut FieldPath) -> CodecResult<()> {
    fp.pop(1)?;
    fp.add_last(1);
    Ok(())
}

fn pop_one_plus_n(r: &mut BitReader<'_>, fp: &mut FieldPath) -> CodecResult<()> {
    fp.pop(1)?;
    fp.add_last(ubvfp(r)?.wrapping_add(1));
    Ok(())
}

fn pop_all_but_one_plus_one(_: &mut BitReader<'_>, fp: &mut FieldPath) -> CodecResult<()> {
    fp.pop(fp.last)?;
    fp.add(0, 1);
    Ok(())
}

fn pop_all_but_one_plus_n(r: &mut BitReader<'_>, fp: &mut FieldPath) -> CodecResult<()> {
    fp.pop(fp.last)?;
    fp.add(0, ubvfp(r)?.wrapping_add(1));
    Ok(())
}

fn pop_all_but_one_plus_n_pack3(r: &mut BitReader<'_>, fp: &mut FieldPath) -> CodecResult<()> {
    fp.pop(fp.last)?;
    fp.add(0, bits(r, 3)? + 1);
    Ok(())
}

fn pop_all_but_one_plus_n_pack6(r: &mut BitReader<'_>, fp: &mut FieldPath) -> CodecResult<()> {
    fp.pop(fp.last)?;
    fp.add(0, bits(r, 6)? + 1);
    Ok(())
}

fn pop_n_plus_one(r: &mut BitReader<'_>, fp: &mut FieldPath) -> CodecResult<()> {
    fp.pop(r.read_ubitvar_fp()? as usize)?;
    fp.add_last(1);
    Ok(())
}

fn pop_n_plus_n(r: &mut BitReader<'_>, fp: &mut FieldPath) -> CodecResult<()> {
    fp.pop(r.read_ubitvar_fp()? as usize)?;
    fp.add_last(r.read_vars32()?);
    Ok(())
}

fn pop_n_and_non_topographical(r: &mut BitReader<'_>, fp: &mut FieldPath) -> CodecResult<()> {
    fp.pop(r.read_ubitvar_fp()? as usize)?;
    add_flagged(r, fp, |r| Ok(r.read_vars32()?))
}

fn non_topo_complex(r: &mut BitReader<'_>, fp: &mut FieldPath) -> CodecResult<()> {
    add_flagged(r, fp, |r| Ok(r.read_vars32()?))
}

fn non_topo_penultimate_plus_one(_: &mut BitReader<'_>, fp: &mut FieldPath) -> CodecResult<()> {
    if fp.last == 0 {
        return Err(CodecError::FieldPathOverflow { depth: 0 });
    }
    fp.add(fp.last - 1, 1);
    Ok(())
}

fn non_topo_complex_pack4(r: &mut BitReader<'_>, fp: &mut FieldPath) -> CodecResult<()> {
    add_flagged(r, fp, |r| Ok(bits(r, 4)? - 7))
}

fn field_path_encode_finish(_: &mut BitReader<'_>, fp: &mut FieldPath) -> CodecResult<()> {
    fp.done = true;
    Ok(())
}

const fn op(name: &'static str, weight: u32, apply: FieldPathOpFn) -> FieldPathOp {
    FieldPathOp {
        name,
        weight,
        apply,
    }
}

/// The opcode table, indexed by Huffman symbol.
///
/// Weights are empirical frequencies; zero weights count as one when the tree
/// is built.
pub static FIELD_PATH_OPS: [FieldPathOp; 40] = [
    op("PlusOne", 36271, plus_one),
    op("PlusTwo", 10334, plus_two),
    op("PlusThree", 1375, plus_three),
    op("PlusFour", 646, plus_four),
    op("PlusN", 4128, plus_n),
    op("PushOneLeftDeltaZeroRightZero", 35, push_one_left_delta_zero_right_zero),
    op("PushOneLeftDeltaZeroRightNonZero", 3, push_one_left_delta_zero_right_non_zero),
    op("PushOneLeftDeltaOneRightZero", 521, push_one_left_delta_one_right_zero),
    op("PushOneLeftDeltaOneRightNonZero", 2942, push_one_left_delta_one_right_non_zero),
    op("PushOneLeftDeltaNRightZero", 560, push_one_left_delta_n_right_zero),
    op("PushOneLeftDeltaNRightNonZero", 471, push_one_left_delta_n_right_non_zero),
    op(
        "PushOneLeftDeltaNRightNonZeroPack6Bits",
        10530,
        push_one_left_delta_n_right_non_zero_pack6,
    ),
    op(
        "PushOneLeftDeltaNRightNonZeroPack8Bits",
        251,
        push_one_left_delta_n_right_non_zero_pack8,
    ),
    op("PushTwoLeftDeltaZero", 0, push_two_left_delta_zero),
    op("PushTwoPack5LeftDeltaZero", 0, push_two_pack5_left_delta_zero),
    op("PushThreeLeftDeltaZero", 0, push_three_left_delta_zero),
    op("PushThreePack5LeftDeltaZero", 0, push_three_pack5_left_delta_zero),
    op("PushTwoLeftDeltaOne", 0, push_two_left_delta_one),
    op("PushTwoPack5LeftDeltaOne", 0, push_two_pack5_left_delta_one),
    op("PushThreeLeftDeltaOne", 0, push_three_left_delta_one),
    op("PushThreePack5LeftDeltaOne", 0, push_three_pack5_left_delta_one),
    op("PushTwoLeftDeltaN", 0, push_two_left_delta_n),
    op("PushTwoPack5LeftDeltaN", 0, push_two_pack5_left_delta_n),
    op("PushThreeLeftDeltaN", 0, push_three_left_delta_n),
    op("PushThreePack5LeftDeltaN", 0, push_three_pack5_left_delta_n),
    op("PushN", 0, push_n),
    op("PushNAndNonTopological", 310, push_n_and_non_topological),
    op("PopOnePlusOne", 2, pop_one_plus_one),
    op("PopOnePlusN", 0, pop_one_plus_n),
    op("PopAllButOnePlusOne", 1837, pop_all_but_one_plus_one),
    op("PopAllButOnePlusN", 149, pop_all_but_one_plus_n),
    op("PopAllButOnePlusNPack3Bits", 300, pop_all_but_one_plus_n_pack3),
    op("PopAllButOnePlusNPack6Bits", 634, pop_all_but_one_plus_n_pack6),
    op("PopNPlusOne", 0, pop_n_plus_one),
    op("PopNPlusN", 0, pop_n_plus_n),
    op("PopNAndNonTopographical", 1, pop_n_and_non_topographical),
    op("NonTopoComplex", 76, non_topo_complex),
    op("NonTopoPenultimatePlusOne", 271, non_topo_penultimate_plus_one),
    op("NonTopoComplexPack4Bits", 99, non_topo_complex_pack4),
    op("FieldPathEncodeFinish", 25474, field_path_encode_finish),
];

/// A free list of field paths.
///
/// Paths are handed out as [`FieldPathLease`]s, which reset the path and
/// return it to the pool when dropped.
#[derive(Debug, Default)]
pub struct FieldPathPool {
    free: Vec<FieldPath>,
}

impl FieldPathPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Leases a path in the initial state.
    pub fn lease(&mut self) -> FieldPathLease<'_> {
        let path = self.free.pop().unwrap_or_default();
        FieldPathLease { pool: self, path }
    }

    /// Number of paths waiting for reuse.
    #[must_use]
    pub fn available(&self) -> usize {
        self.free.len()
    }
}

/// A field path borrowed from a [`FieldPathPool`].
#[derive(Debug)]
pub struct FieldPathLease<'a> {
    pool: &'a mut FieldPathPool,
    path: FieldPath,
}

impl Deref for FieldPathLease<'_> {
    type Target = FieldPath;

    fn deref(&self) -> &FieldPath {
        &self.path
    }
}

impl DerefMut for FieldPathLease<'_> {
    fn deref_mut(&mut self) -> &mut FieldPath {
        &mut self.path
    }
}

impl Drop for FieldPathLease<'_> {
    fn drop(&mut self) {
        let mut path = self.path;
        path.reset();
        self.pool.free.push(path);
    }
}
