//! Names of the activities sequences are tagged with.

/// Activity of sequences that aren't tagged.
pub const RESET: i32 = 0;

static NAMES: [&str; 76] = [
    "idle",
    "guard",
    "walk",
    "run",
    "fly",
    "swim",
    "hop",
    "leap",
    "fall",
    "land",
    "strafe_left",
    "strafe_right",
    "roll_left",
    "roll_right",
    "turn_left",
    "turn_right",
    "crouch",
    "crouchidle",
    "stand",
    "use",
    "signal1",
    "signal2",
    "signal3",
    "twitch",
    "cower",
    "small_flinch",
    "big_flinch",
    "range_attack1",
    "range_attack2",
    "melee_attack1",
    "melee_attack2",
    "reload",
    "arm",
    "disarm",
    "eat",
    "diesimple",
    "diebackward",
    "dieforward",
    "dieviolent",
    "barnacle_hit",
    "barnacle_pull",
    "barnacle_chomp",
    "barnacle_chew",
    "sleep",
    "inspect_floor",
    "inspect_wall",
    "idle_angry",
    "walk_hurt",
    "run_hurt",
    "hover",
    "glide",
    "fly_left",
    "fly_right",
    "detect_scent",
    "sniff",
    "bite",
    "threat_display",
    "fear_display",
    "excited",
    "special_attack1",
    "special_attack2",
    "combat_idle",
    "walk_scared",
    "run_scared",
    "victory_dance",
    "die_headshot",
    "die_chestshot",
    "die_gutshot",
    "die_backshot",
    "flinch_head",
    "flinch_chest",
    "flinch_stomach",
    "flinch_leftarm",
    "flinch_rightarm",
    "flinch_leftleg",
    "flinch_rightleg",
];

/// Name of a known activity id, starting at `1` for `idle`.
#[must_use]
pub fn name(activity: i32) -> Option<&'static str> {
    usize::try_from(activity)
        .ok()
        .and_then(|id| id.checked_sub(1))
        .and_then(|index| NAMES.get(index))
        .copied()
}

/// Activity id of `name`, case insensitive.
#[must_use]
pub fn id(name: &str) -> Option<i32> {
    NAMES
        .iter()
        .position(|candidate| candidate.eq_ignore_ascii_case(name))
        .map(|index| index as i32 + 1)
}

/// Display name, including the untagged and unknown cases.
#[must_use]
pub fn describe(activity: i32) -> &'static str {
    match activity {
        RESET => "none",
        _ => name(activity).unwrap_or("unknown"),
    }
}
