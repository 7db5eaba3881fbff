//! Order-sensitive traversal.
//!
//! Children are framed by `OPEN`/`CLOSE` and separated by `SEPARATOR`, so
//! `[[1], 2]` and `[1, [2]]` never produce the same byte stream. Children
//! dropped by `skip_zero` leave no separator behind.

use super::{
    CLOSE, COLON, Composite, Context, EncoderRef, FieldPlan, FieldSource, LazyEncoder, OPEN,
    SEPARATOR, active_variant, elements, entries,
};
use crate::accumulator::Accumulator;
use crate::error::HashResult;
use crate::options::Flags;
use crate::reflect::Reflect;
use crate::state::HashState;

/// Tracks whether a separator is due before the next child.
struct Framer {
    first: bool,
}

impl Framer {
    fn open<A: Accumulator>(state: &mut HashState<A>) -> HashResult<Self> {
        state.write_byte(OPEN)?;
        Ok(Self { first: true })
    }

    fn child<A: Accumulator>(&mut self, state: &mut HashState<A>) -> HashResult<()> {
        if !std::mem::replace(&mut self.first, false) {
            state.write_byte(SEPARATOR)?;
        }
        Ok(())
    }

    fn close<A: Accumulator>(self, state: &mut HashState<A>) -> HashResult<()> {
        state.write_byte(CLOSE)
    }
}

pub(crate) fn encode<A: Accumulator>(
    composite: &Composite,
    value: &dyn Reflect,
    state: &mut HashState<A>,
    cx: &Context<'_, A>,
) -> HashResult<()> {
    match composite {
        Composite::Elements { elem, skip_zero } => {
            let access = elements(value)?;
            let mut framer = Framer::open(state)?;
            access.for_each_element(&mut |item| {
                if *skip_zero && elem.is_zero(item) {
                    return Ok(());
                }
                framer.child(state)?;
                elem.encode(item, state, cx)
            })?;
            framer.close(state)
        }
        Composite::Fields { fields } => {
            let source = FieldSource::of_struct(value)?;
            encode_fields(fields, source, value, state, cx)
        }
        Composite::Variants { variants } => {
            let (plan, source) = active_variant(variants, value)?;
            state.write(plan.name.as_bytes())?;
            if plan.fields.is_empty() {
                return Ok(());
            }
            encode_fields(&plan.fields, source, value, state, cx)
        }
        Composite::Entries {
            key,
            value: val,
            skip_zero,
        } => {
            let access = entries(value)?;
            let mut framer = Framer::open(state)?;
            access.for_each_entry(&mut |k, v| {
                if *skip_zero && val.is_zero(v) {
                    return Ok(());
                }
                framer.child(state)?;
                encode_pair(key, val, k, v, state, cx)
            })?;
            framer.close(state)
        }
        Composite::LazyElements { elem, flags } => {
            let access = elements(value)?;
            let skip_zero = flags.contains(Flags::SKIP_ZERO);
            let mut lazy = LazyEncoder::new(*elem, *flags, cx.compiler);
            let mut framer = Framer::open(state)?;
            access.for_each_element(&mut |item| {
                let encoder = lazy.get()?;
                if skip_zero && encoder.is_zero(item) {
                    return Ok(());
                }
                framer.child(state)?;
                encoder.encode(item, state, cx)
            })?;
            framer.close(state)
        }
        Composite::LazyEntries { key, value: val, flags } => {
            let access = entries(value)?;
            let skip_zero = flags.contains(Flags::SKIP_ZERO);
            let mut lazy_key = LazyEncoder::new(*key, *flags, cx.compiler);
            let mut lazy_val = LazyEncoder::new(*val, *flags, cx.compiler);
            let mut framer = Framer::open(state)?;
            access.for_each_entry(&mut |k, v| {
                let (key, val) = (lazy_key.get()?, lazy_val.get()?);
                if skip_zero && val.is_zero(v) {
                    return Ok(());
                }
                framer.child(state)?;
                encode_pair(&key, &val, k, v, state, cx)
            })?;
            framer.close(state)
        }
    }
}

fn encode_fields<A: Accumulator>(
    fields: &[FieldPlan],
    source: FieldSource<'_>,
    owner: &dyn Reflect,
    state: &mut HashState<A>,
    cx: &Context<'_, A>,
) -> HashResult<()> {
    let mut framer = Framer::open(state)?;
    for plan in fields {
        let field = source.get(owner, plan.index)?;
        if plan.skip_zero && plan.encoder.is_zero(field) {
            continue;
        }
        framer.child(state)?;
        state.write(plan.name.as_bytes())?;
        state.write_byte(COLON)?;
        plan.encoder.encode(field, state, cx)?;
    }
    framer.close(state)
}

pub(super) fn encode_pair<A: Accumulator>(
    key: &EncoderRef,
    val: &EncoderRef,
    k: &dyn Reflect,
    v: &dyn Reflect,
    state: &mut HashState<A>,
    cx: &Context<'_, A>,
) -> HashResult<()> {
    key.encode(k, state, cx)?;
    state.write_byte(COLON)?;
    val.encode(v, state, cx)
}
