// crates/tg_algo/src/lib.rs
//! Pure algorithms of the tag engine. No I/O, no clocks, no randomness:
//! identical inputs always give identical outputs.
#![forbid(unsafe_code)]

// ----------------------------- Ranking & points ---------------------------------------

pub mod ranking;
pub mod points;

pub use points::score_round;
pub use ranking::{classify_tier, compute_matchup_points, update_best_tag_ever};

// ----------------------------- Allocation (public surface) ---------------------------

pub mod allocation {
    pub mod closed_pool;
    pub mod reset;
    pub mod projection;
    pub mod slots;

    pub use closed_pool::allocate_closed_pool;
    pub use projection::{apply_changes_to_slots, project_final_state, slots_by_member};
    pub use reset::allocate_from_reset;
    pub use slots::{build_leaderboard_slots, insert_tag_holder, parse_assignment_pair};
}

pub use allocation::{
    allocate_closed_pool, allocate_from_reset, apply_changes_to_slots, build_leaderboard_slots,
    insert_tag_holder, project_final_state,
};
