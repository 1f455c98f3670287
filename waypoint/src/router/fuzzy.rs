//! Fuzzy preference scoring over backend health signals.
//!
//! Four linguistic variables are fuzzified with fixed triangular membership
//! functions and composed through a small rule base. Each rule ANDs its
//! conditions via `min`, contributes its weight scaled by the firing
//! strength, and is boosted by 1.5 when its tag matches the caller's
//! priority axis. The result is an unnormalized preference score in
//! `[0, +inf)`; only relative ordering matters to the router.

use waypoint_types::PriorityAxis;

/// Raw signals for one backend, normalized before fuzzification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzyInputs {
    /// Response-time EMA, milliseconds, `[0, 10000]` effective range.
    pub response_time_ms: f64,
    /// Cost efficiency, `[0, 1]`, higher = cheaper. Free-covered requests
    /// score 1.0.
    pub cost_efficiency: f64,
    /// Quality EMA, `[0, 1]`.
    pub quality: f64,
    /// Utilization proxy (inflight over declared per-minute capacity),
    /// `[0, 1]`.
    pub load: f64,
}

/// Triangular membership with peak at `b`, zero outside `(a, c)`.
fn tri(x: f64, a: f64, b: f64, c: f64) -> f64 {
    if x <= a || x >= c {
        0.0
    } else if x <= b {
        (x - a) / (b - a)
    } else {
        (c - x) / (c - b)
    }
}

/// Left shoulder: 1 below `a`, falling to 0 at `b`.
fn shoulder_left(x: f64, a: f64, b: f64) -> f64 {
    if x <= a {
        1.0
    } else if x >= b {
        0.0
    } else {
        (b - x) / (b - a)
    }
}

/// Right shoulder: 0 below `a`, rising to 1 at `b`.
fn shoulder_right(x: f64, a: f64, b: f64) -> f64 {
    if x <= a {
        0.0
    } else if x >= b {
        1.0
    } else {
        (x - a) / (b - a)
    }
}

/// Fuzzy terms over the four input variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Term {
    VeryFast,
    Fast,
    Acceptable,
    Slow,
    Premium,
    Expensive,
    Reasonable,
    Cheap,
    Poor,
    Average,
    Good,
    Excellent,
    LowLoad,
    MediumLoad,
    HighLoad,
}

fn membership(inputs: &FuzzyInputs, term: Term) -> f64 {
    let rt = inputs.response_time_ms.clamp(0.0, 10_000.0);
    let ce = inputs.cost_efficiency.clamp(0.0, 1.0);
    let q = inputs.quality.clamp(0.0, 1.0);
    let load = inputs.load.clamp(0.0, 1.0);
    match term {
        Term::VeryFast => shoulder_left(rt, 300.0, 800.0),
        Term::Fast => tri(rt, 300.0, 800.0, 2_000.0),
        Term::Acceptable => tri(rt, 1_000.0, 2_500.0, 5_000.0),
        Term::Slow => shoulder_right(rt, 4_000.0, 7_000.0),
        Term::Premium => shoulder_left(ce, 0.15, 0.35),
        Term::Expensive => tri(ce, 0.2, 0.4, 0.6),
        Term::Reasonable => tri(ce, 0.4, 0.6, 0.8),
        Term::Cheap => shoulder_right(ce, 0.7, 0.9),
        Term::Poor => shoulder_left(q, 0.25, 0.45),
        Term::Average => tri(q, 0.3, 0.5, 0.7),
        Term::Good => tri(q, 0.55, 0.75, 0.9),
        Term::Excellent => shoulder_right(q, 0.8, 0.95),
        Term::LowLoad => shoulder_left(load, 0.2, 0.5),
        Term::MediumLoad => tri(load, 0.3, 0.5, 0.7),
        Term::HighLoad => shoulder_right(load, 0.6, 0.9),
    }
}

struct Rule {
    antecedent: &'static [Term],
    weight: f64,
    tag: PriorityAxis,
}

/// Boost applied when a rule's tag matches the request's priority axis.
const AXIS_BOOST: f64 = 1.5;

const RULES: &[Rule] = &[
    Rule {
        antecedent: &[Term::VeryFast, Term::LowLoad],
        weight: 1.0,
        tag: PriorityAxis::Speed,
    },
    Rule {
        antecedent: &[Term::VeryFast, Term::Good],
        weight: 0.8,
        tag: PriorityAxis::Speed,
    },
    Rule {
        antecedent: &[Term::Fast, Term::Cheap],
        weight: 0.9,
        tag: PriorityAxis::Balanced,
    },
    Rule {
        antecedent: &[Term::Fast, Term::LowLoad],
        weight: 0.7,
        tag: PriorityAxis::Speed,
    },
    Rule {
        antecedent: &[Term::Cheap, Term::Good],
        weight: 0.9,
        tag: PriorityAxis::Cost,
    },
    Rule {
        antecedent: &[Term::Cheap, Term::Average],
        weight: 0.6,
        tag: PriorityAxis::Cost,
    },
    Rule {
        antecedent: &[Term::Reasonable, Term::Good],
        weight: 0.7,
        tag: PriorityAxis::Balanced,
    },
    Rule {
        antecedent: &[Term::Excellent],
        weight: 0.9,
        tag: PriorityAxis::Accuracy,
    },
    Rule {
        antecedent: &[Term::Excellent, Term::Premium],
        weight: 0.5,
        tag: PriorityAxis::Accuracy,
    },
    Rule {
        antecedent: &[Term::Good, Term::Acceptable],
        weight: 0.5,
        tag: PriorityAxis::Balanced,
    },
    Rule {
        antecedent: &[Term::Average, Term::MediumLoad],
        weight: 0.3,
        tag: PriorityAxis::Balanced,
    },
    // Degenerate-but-alive rules keep the score positive for backends that
    // fire nothing above, preserving ordering against the Q multiplier.
    Rule {
        antecedent: &[Term::Slow],
        weight: 0.05,
        tag: PriorityAxis::Balanced,
    },
    Rule {
        antecedent: &[Term::Poor],
        weight: 0.05,
        tag: PriorityAxis::Balanced,
    },
    Rule {
        antecedent: &[Term::Expensive, Term::HighLoad],
        weight: 0.05,
        tag: PriorityAxis::Cost,
    },
];

/// Floor added to every score so a backend that fires no rule still ranks.
const BASELINE: f64 = 0.05;

/// Compose the rule base into a preference score for one backend.
#[must_use]
pub fn score(inputs: &FuzzyInputs, axis: PriorityAxis) -> f64 {
    let mut total = BASELINE;
    for rule in RULES {
        let firing = rule
            .antecedent
            .iter()
            .map(|t| membership(inputs, *t))
            .fold(1.0_f64, f64::min);
        if firing <= 0.0 {
            continue;
        }
        let boost = if rule.tag == axis { AXIS_BOOST } else { 1.0 };
        total += firing * rule.weight * boost;
    }
    total
}
