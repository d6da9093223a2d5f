//! Equivalence assertions.
//!
//! Every check returns `VerifyError::Assertion` instead of panicking, so a
//! failing scenario still unwinds through its drive binding and fixture.
//! The caller's source location is recorded via `#[track_caller]`.

use std::fmt::Debug;
use std::panic::Location;
use std::path::Path;

use serde::Serialize;

use crate::error::{VerifyError, VerifyResult};
use crate::probe;

#[track_caller]
fn failure(property: String, left: String, right: String) -> VerifyError {
    let loc = Location::caller();
    VerifyError::Assertion {
        property,
        left,
        right,
        location: format!("{}:{}", loc.file(), loc.line()),
    }
}

/// `left == right`, reported under `property`.
#[track_caller]
pub fn equal<T: PartialEq + Debug>(property: &str, left: &T, right: &T) -> VerifyResult<()> {
    if left == right {
        Ok(())
    } else {
        Err(failure(
            property.to_string(),
            format!("{:?}", left),
            format!("{:?}", right),
        ))
    }
}

/// A single expected boolean fact.
#[track_caller]
pub fn holds(property: &str, observed: bool) -> VerifyResult<()> {
    if observed {
        Ok(())
    } else {
        Err(failure(property.to_string(), "expected true".to_string(), "false".to_string()))
    }
}

/// Structural equality of two snapshots of `left_path` and `right_path`.
/// On mismatch the diverging fields are named.
#[track_caller]
pub fn snapshots_equal<T>(what: &str, left_path: &Path, left: &T, right_path: &Path, right: &T) -> VerifyResult<()>
where
    T: PartialEq + Serialize,
{
    if left == right {
        return Ok(());
    }

    let diffs = probe::diff(left, right);
    let fields: Vec<&str> = diffs.iter().map(|d| d.field.as_str()).collect();
    let render = |side: fn(&probe::FieldDiff) -> &serde_json::Value| {
        diffs
            .iter()
            .map(|d| format!("{}={}", d.field, side(d)))
            .collect::<Vec<_>>()
            .join(", ")
    };
    Err(failure(
        format!(
            "{} [{}] of {} vs {}",
            what,
            fields.join(", "),
            left_path.display(),
            right_path.display()
        ),
        render(|d| &d.left),
        render(|d| &d.right),
    ))
}

/// Both paths must denote the same underlying file.
#[track_caller]
pub fn same_file(left: &Path, right: &Path) -> VerifyResult<()> {
    let (l, r) = (probe::FileIdentity::of(left)?, probe::FileIdentity::of(right)?);
    if l == r {
        Ok(())
    } else {
        Err(failure(
            format!("file identity of {} vs {}", left.display(), right.display()),
            format!("{:?}", l),
            format!("{:?}", r),
        ))
    }
}
