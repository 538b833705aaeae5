//! # Local Split Engine
//!
//! ```text
//! local edges ──► stitch() ──► LocalGraph + ties ──► Dinic ──► verify ──► remap_cut()
//!  (original ids)  (must-merge      (dense slots)      (max-flow)  (partition)   (original ids)
//!                   collapsed)
//! ```
//!
//! Every stage is a pure function of its inputs. Nothing is shared between
//! calls, so independent split requests can run on separate threads.

pub mod stitch;
pub mod flow;
pub mod mincut;
pub mod remap;

pub use stitch::{stitch, StitchMapping, Stitched};
pub use flow::{Capacity, FlowNetwork};
pub use mincut::{mincut, MinCutOutcome, NoCutReason};
pub use remap::remap_cut;
