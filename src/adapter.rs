//! [`Handler`] implementation that writes through a [`BackendLogger`].
//!
//! Groups and attributes added with `with_group` / `with_attrs` are kept as
//! a stack of scope frames. When a record is handled the frames are folded
//! into nested backend dictionaries, innermost group first, so the output
//! nests in the same order the groups were opened.

use std::sync::Arc;

use crate::backend::{BackendLevel, BackendLogger};
use crate::event::{Dict, Fields};
use crate::handler::{HandleError, Handler};
use crate::record::{Level, Record};
use crate::value::{Attr, Value};

/// Front-end level units per backend level step.
///
/// Tied to the backend's scale (trace = -1 .. panic = 5); a backend with a
/// different number of levels needs a different ratio.
pub const LEVEL_RATIO: i32 = 4;

/// One nesting level: a group name and the attributes added inside it.
#[derive(Debug, Clone, Default)]
struct ScopeFrame {
    group: String,
    attrs: Vec<Attr>,
}

/// Adapter from the front-end [`Handler`] contract to the backend logger.
///
/// Frame 0 is the root scope and holds attributes added before any group.
/// Frames are shared between a handler and its children; deriving a
/// handler copies the frame list and replaces at most the last frame.
#[derive(Debug, Clone)]
pub struct ZslogHandler {
    logger: BackendLogger,
    frames: Vec<Arc<ScopeFrame>>,
}

impl ZslogHandler {
    pub fn new(logger: BackendLogger) -> Self {
        ZslogHandler {
            logger,
            frames: vec![Arc::new(ScopeFrame::default())],
        }
    }

    pub fn backend(&self) -> &BackendLogger {
        &self.logger
    }

    /// Flush the backend's sink. `handle` writes lines but never flushes.
    pub fn flush(&self) -> Result<(), HandleError> {
        self.logger.flush().map_err(HandleError::Write)
    }

    fn push_group(&self, name: &str) -> Self {
        let mut frames = self.frames.clone();
        frames.push(Arc::new(ScopeFrame {
            group: name.to_string(),
            attrs: Vec::new(),
        }));
        ZslogHandler { logger: self.logger.clone(), frames }
    }

    fn extend_attrs(&self, attrs: Vec<Attr>) -> Self {
        let mut frames = self.frames.clone();
        if let Some(last) = frames.last_mut() {
            let mut frame = ScopeFrame::clone(last);
            frame.attrs.extend(attrs);
            *last = Arc::new(frame);
        }
        ZslogHandler { logger: self.logger.clone(), frames }
    }
}

/// Map a front-end level onto the backend scale.
pub fn backend_level(level: Level) -> BackendLevel {
    let scaled = (level.0 / LEVEL_RATIO + 1).clamp(-1, 5);
    BackendLevel::from_i8(scaled as i8)
}

/// Whether a front-end `level` passes a backend minimum of `min`.
///
/// The level must be strictly above `(min - 1) * LEVEL_RATIO`, so the gate
/// is closed at exactly the minimum: with `min = Info`, `Level::INFO` is
/// disabled and `Level(1)` is the first enabled level. Records handled
/// directly at that boundary are still written, since the backend filter
/// accepts `backend_level(Level::INFO) == Info`.
pub fn level_enabled(level: Level, min: BackendLevel) -> bool {
    level.0 > (min.as_i8() as i32 - 1) * LEVEL_RATIO
}

impl Handler for ZslogHandler {
    fn enabled(&self, level: Level) -> bool {
        level_enabled(level, self.logger.get_level())
    }

    fn handle(&self, record: &Record) -> Result<(), HandleError> {
        let Some(mut event) = self.logger.with_level(backend_level(record.level)) else {
            return Ok(());
        };
        if let Some(time) = &record.time {
            event = event.timestamp(time);
        }

        let top = self.frames.len() - 1;
        let mut dict = Dict::new();
        for i in (1..self.frames.len()).rev() {
            let frame = &self.frames[i];
            // A wrapped inner group counts as content for this frame.
            let mut added = !dict.is_empty();
            for attr in &frame.attrs {
                let (d, add) = add_attr(dict, attr);
                dict = d;
                added |= add;
            }
            if i == top {
                for attr in record.attrs() {
                    let (d, add) = add_attr(dict, attr);
                    dict = d;
                    added |= add;
                }
            }
            if !added {
                continue;
            }
            if i > 1 {
                dict = Dict::new().dict(&frame.group, dict);
            } else {
                event = event.dict(&frame.group, std::mem::take(&mut dict));
            }
        }

        if top == 0 {
            for attr in record.attrs() {
                event = add_attr(event, attr).0;
            }
        }
        for attr in &self.frames[0].attrs {
            event = add_attr(event, attr).0;
        }

        event.msg(&record.message).map_err(HandleError::Write)
    }

    fn with_attrs(&self, attrs: Vec<Attr>) -> Arc<dyn Handler> {
        Arc::new(self.extend_attrs(attrs))
    }

    fn with_group(&self, name: &str) -> Arc<dyn Handler> {
        Arc::new(self.push_group(name))
    }
}

/// Fold one attribute into `dst`, returning the destination and whether
/// anything was written.
fn add_attr<F: Fields>(dst: F, attr: &Attr) -> (F, bool) {
    if attr.is_empty() {
        return (dst, false);
    }
    let key = attr.key.as_str();
    match attr.value.resolve() {
        Value::Any(v) => (dst.any(key, &v), true),
        Value::Bool(v) => (dst.bool(key, v), true),
        Value::Duration(v) => (dst.dur(key, v), true),
        Value::Float64(v) => (dst.f64(key, v), true),
        Value::Int64(v) => (dst.i64(key, v), true),
        Value::String(v) => (dst.str(key, &v), true),
        Value::Time(v) => (dst.time(key, &v), true),
        Value::Uint64(v) => (dst.u64(key, v), true),
        Value::Group(members) if key.is_empty() => {
            let mut dst = dst;
            for a in &members {
                dst = add_attr(dst, a).0;
            }
            (dst, true)
        }
        Value::Group(members) => {
            let mut added = false;
            let mut d = Dict::new();
            for a in &members {
                let (next, add) = add_attr(d, a);
                d = next;
                added |= add;
            }
            if added {
                (dst.dict(key, d), true)
            } else {
                (dst, false)
            }
        }
        Value::LogValuer(_) => (dst, false),
    }
}
