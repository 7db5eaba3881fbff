//! Order-insensitive traversal.
//!
//! Every child is hashed on its own into a pooled temporary state and the
//! sub-digests are XOR-combined, so iteration order cannot affect the result.
//! The fold is framed as `FOLD_OPEN xor_le64 FOLD_CLOSE`; an empty fold is just
//! `FOLD_OPEN FOLD_CLOSE`.
//!
//! # Limitations
//!
//! XOR is not a multiset hash: a child that appears twice cancels itself out,
//! so `{a, a, b}` and `{b}` fold to the same word (the framing still tells an
//! empty fold apart from a non-empty one). Sets and maps never hold duplicates;
//! unordered slices with repeated elements can collide.
//!
//! Temporaries start from a snapshot of the parent's visited set: a cycle that
//! leads back through a folded child still terminates, and siblings do not see
//! each other's visits.

use super::{
    COLON, Composite, Context, FOLD_CLOSE, FOLD_OPEN, FieldSource, LazyEncoder, active_variant,
    elements, entries, ordered::encode_pair,
};
use crate::accumulator::Accumulator;
use crate::error::HashResult;
use crate::options::Flags;
use crate::reflect::Reflect;
use crate::state::HashState;

#[derive(Default)]
struct Fold {
    word: u64,
    count: usize,
}

impl Fold {
    fn add(&mut self, digest: u64) {
        self.word ^= digest;
        self.count += 1;
    }

    fn finish<A: Accumulator>(self, state: &mut HashState<A>) -> HashResult<()> {
        state.write_byte(FOLD_OPEN)?;
        if self.count > 0 {
            state.write_u64(self.word)?;
        }
        state.write_byte(FOLD_CLOSE)
    }
}

/// Digest of whatever `f` writes into a fresh temporary.
fn sub_digest<A: Accumulator>(
    parent: &HashState<A>,
    cx: &Context<'_, A>,
    f: impl FnOnce(&mut HashState<A>) -> HashResult<()>,
) -> HashResult<u64> {
    cx.pool.with_state(|tmp| {
        tmp.reset_from(parent);
        f(tmp)?;
        Ok(tmp.sum64())
    })
}

pub(crate) fn encode<A: Accumulator>(
    composite: &Composite,
    value: &dyn Reflect,
    state: &mut HashState<A>,
    cx: &Context<'_, A>,
) -> HashResult<()> {
    let mut fold = Fold::default();
    match composite {
        Composite::Elements { elem, skip_zero } => {
            elements(value)?.for_each_element(&mut |item| {
                if *skip_zero && elem.is_zero(item) {
                    return Ok(());
                }
                fold.add(sub_digest(state, cx, |tmp| elem.encode(item, tmp, cx))?);
                Ok(())
            })?;
        }
        Composite::Fields { fields } => {
            let source = FieldSource::of_struct(value)?;
            fold_fields(&mut fold, fields, source, value, state, cx)?;
        }
        Composite::Variants { variants } => {
            let (plan, source) = active_variant(variants, value)?;
            state.write(plan.name.as_bytes())?;
            if plan.fields.is_empty() {
                return Ok(());
            }
            fold_fields(&mut fold, &plan.fields, source, value, state, cx)?;
        }
        Composite::Entries {
            key,
            value: val,
            skip_zero,
        } => {
            entries(value)?.for_each_entry(&mut |k, v| {
                if *skip_zero && val.is_zero(v) {
                    return Ok(());
                }
                fold.add(sub_digest(state, cx, |tmp| encode_pair(key, val, k, v, tmp, cx))?);
                Ok(())
            })?;
        }
        Composite::LazyElements { elem, flags } => {
            let skip_zero = flags.contains(Flags::SKIP_ZERO);
            let mut lazy = LazyEncoder::new(*elem, *flags, cx.compiler);
            elements(value)?.for_each_element(&mut |item| {
                let encoder = lazy.get()?;
                if skip_zero && encoder.is_zero(item) {
                    return Ok(());
                }
                fold.add(sub_digest(state, cx, |tmp| encoder.encode(item, tmp, cx))?);
                Ok(())
            })?;
        }
        Composite::LazyEntries { key, value: val, flags } => {
            let skip_zero = flags.contains(Flags::SKIP_ZERO);
            let mut lazy_key = LazyEncoder::new(*key, *flags, cx.compiler);
            let mut lazy_val = LazyEncoder::new(*val, *flags, cx.compiler);
            entries(value)?.for_each_entry(&mut |k, v| {
                let (key, val) = (lazy_key.get()?, lazy_val.get()?);
                if skip_zero && val.is_zero(v) {
                    return Ok(());
                }
                fold.add(sub_digest(state, cx, |tmp| encode_pair(&key, &val, k, v, tmp, cx))?);
                Ok(())
            })?;
        }
    }
    fold.finish(state)
}

fn fold_fields<A: Accumulator>(
    fold: &mut Fold,
    fields: &[super::FieldPlan],
    source: FieldSource<'_>,
    owner: &dyn Reflect,
    state: &HashState<A>,
    cx: &Context<'_, A>,
) -> HashResult<()> {
    for plan in fields {
        let field = source.get(owner, plan.index)?;
        if plan.skip_zero && plan.encoder.is_zero(field) {
            continue;
        }
        fold.add(sub_digest(state, cx, |tmp| {
            tmp.write(plan.name.as_bytes())?;
            tmp.write_byte(COLON)?;
            plan.encoder.encode(field, tmp, cx)
        })?);
    }
    Ok(())
}
