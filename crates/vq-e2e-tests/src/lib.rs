//! Test-only crate. Scenarios live under `tests/` and share `tests/helpers`.
