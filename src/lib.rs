//! Workspace-level end-to-end tests; see `tests/`.
