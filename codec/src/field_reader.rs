//! Reading field paths and their values from an entity payload.

use bitstream::BitReader;
use schema::Serializer;

use crate::error::{CodecError, CodecResult, LimitKind};
use crate::field_path::{FieldPath, FieldPathPool, FIELD_PATH_OPS};
use crate::field_state::FieldState;
use crate::huffman::field_path_tree;
use crate::limits::CodecLimits;
use crate::scratch::DecodeScratch;

/// Decodes field-path opcodes until the finish opcode, appending one path per
/// changed field to `out`.
///
/// # Errors
///
/// Fails on truncated input, on a path leaving its bounds, or when more than
/// `max_paths` paths are produced.
pub fn read_field_paths(
    reader: &mut BitReader<'_>,
    pool: &mut FieldPathPool,
    out: &mut Vec<FieldPath>,
    max_paths: usize,
) -> CodecResult<()> {
    let tree = field_path_tree();
    let mut fp = pool.lease();
    while !fp.is_done() {
        let symbol = tree.decode_symbol(reader)?;
        (FIELD_PATH_OPS[symbol].apply)(reader, &mut fp)?;
        if fp.is_done() {
            break;
        }
        if out.len() >= max_paths {
            return Err(CodecError::LimitsExceeded {
                kind: LimitKind::FieldPaths,
                limit: max_paths,
                actual: out.len() + 1,
            });
        }
        out.push(*fp);
    }
    Ok(())
}

/// Decodes one field update block into `state`.
///
/// Returns the number of fields written. Value errors are wrapped in
/// [`CodecError::FieldDecode`] with the entity, class, path and bit offset.
/// A path index above `limits.max_field_index` fails before its value is
/// read.
pub fn decode_fields(
    reader: &mut BitReader<'_>,
    serializer: &Serializer,
    state: &mut FieldState,
    scratch: &mut DecodeScratch,
    limits: &CodecLimits,
    entity: u32,
) -> CodecResult<usize> {
    scratch.paths.clear();
    read_field_paths(
        reader,
        &mut scratch.pool,
        &mut scratch.paths,
        limits.max_field_paths,
    )?;

    for fp in &scratch.paths {
        check_indices(fp, limits.max_field_index)?;
        let bit_position = reader.bit_position();
        let value = serializer
            .decoder_for_path(fp.as_slice(), 0)
            .map_err(CodecError::from)
            .and_then(|decoder| decoder.decode(reader).map_err(CodecError::from))
            .map_err(|source| CodecError::FieldDecode {
                entity,
                class: serializer.name().to_string(),
                path: fp.to_string(),
                bit_position,
                source: Box::new(source),
            })?;
        tracing::trace!(entity, path = %fp, kind = value.kind(), "field");
        state.set(fp.as_slice(), value);
    }
    Ok(scratch.paths.len())
}

fn check_indices(fp: &FieldPath, max_index: usize) -> CodecResult<()> {
    for &index in fp.as_slice() {
        if let Ok(index) = usize::try_from(index) {
            if index > max_index {
                return Err(CodecError::LimitsExceeded {
                    kind: LimitKind::FieldIndex,
                    limit: max_index,
                    actual: index,
                });
            }
        }
    }
    Ok(())
}
