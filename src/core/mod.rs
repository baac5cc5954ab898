//! Core domain types shared by the agent pipeline, search backends and CLI.

pub mod citation;
pub mod evidence;
pub mod verdict;

pub use citation::{Citation, parse_citations};
pub use evidence::{EvidenceItem, EvidenceRef};
pub use verdict::Verdict;
