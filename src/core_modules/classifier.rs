// THEORY:
// The `classifier` is a stateless leaf utility: a pure mapping from a
// detection's (area, brightness) pair to an object label. Like the rest of
// the detection heuristics in this crate it makes no claim to astronomical
// accuracy; it reproduces an established rule table exactly.
//
// The table is evaluated with *last-match-wins* semantics: every predicate is
// checked, and the label of the last rule that holds is returned. This is not
// the usual first-match scheme, and it has a visible consequence: a very
// small, very bright object satisfies the star, comet, and planet rules at
// once and comes out labeled "planet". The ordering is preserved verbatim
// because downstream consumers depend on the produced labels; the tests below
// pin the behavior.

pub mod classifier {
    use crate::error::PipelineError;
    use std::fmt;

    /// The label assigned to a detected object.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ObjectClass {
        Star,
        Comet,
        Planet,
        Galaxy,
        Quasar,
    }

    impl fmt::Display for ObjectClass {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let label = match self {
                ObjectClass::Star => "star",
                ObjectClass::Comet => "comet",
                ObjectClass::Planet => "planet",
                ObjectClass::Galaxy => "galaxy",
                ObjectClass::Quasar => "quasar",
            };
            f.write_str(label)
        }
    }

    /// The fixed rule table. Order matters: the last rule whose predicate
    /// holds supplies the label.
    const RULES: [(fn(f64, f64) -> bool, ObjectClass); 6] = [
        (|area, brightness| area < 10.0 && brightness > 100.0, ObjectClass::Star),
        (|area, brightness| area < 10.0 && brightness > 50.0, ObjectClass::Comet),
        (|area, brightness| area < 10.0 && brightness > 0.0, ObjectClass::Planet),
        (
            |area, brightness| area > 10_000.0 && brightness > 1_000_000.0,
            ObjectClass::Galaxy,
        ),
        (
            |area, brightness| area < 10_000.0 && brightness > 1_000_000.0,
            ObjectClass::Quasar,
        ),
        (|area, brightness| area >= 10.0 && brightness > 0.0, ObjectClass::Star),
    ];

    /// Maps a detection's contour area and brightness to a label.
    ///
    /// Fails with `UnclassifiableObject` when no rule matches, which happens
    /// for degenerate detections (non-positive brightness, or huge area with
    /// no brightness to speak of).
    pub fn classify(area: f64, brightness: f64) -> Result<ObjectClass, PipelineError> {
        let mut label = None;
        for (applies, class) in RULES {
            if applies(area, brightness) {
                label = Some(class);
            }
        }
        label.ok_or(PipelineError::UnclassifiableObject { area, brightness })
    }
}

#[cfg(test)]
mod tests {
    use super::classifier::*;
    use crate::error::PipelineError;

    #[test]
    fn small_bright_object_is_a_planet() {
        // Rules 1-3 all match; the last one wins.
        assert_eq!(classify(5.0, 150.0).unwrap(), ObjectClass::Planet);
    }

    #[test]
    fn planet_rule_shadows_comet_and_star_for_small_objects() {
        // Any small object with positive brightness matches the planet rule,
        // which sits after the star and comet rules, so those two labels are
        // unreachable below area 10. Preserved as-is.
        assert_eq!(classify(5.0, 60.0).unwrap(), ObjectClass::Planet);
        assert_eq!(classify(5.0, 30.0).unwrap(), ObjectClass::Planet);
    }

    #[test]
    fn tiny_ultra_bright_object_is_a_quasar() {
        // The quasar rule is later still and takes over past a million.
        assert_eq!(classify(5.0, 2_000_000.0).unwrap(), ObjectClass::Quasar);
    }

    #[test]
    fn huge_bright_object_is_a_galaxy() {
        assert_eq!(classify(20_000.0, 2_000_000.0).unwrap(), ObjectClass::Galaxy);
    }

    #[test]
    fn mid_sized_bright_object_is_a_quasar() {
        assert_eq!(classify(5_000.0, 2_000_000.0).unwrap(), ObjectClass::Quasar);
    }

    #[test]
    fn ordinary_object_is_a_star() {
        assert_eq!(classify(15.0, 5.0).unwrap(), ObjectClass::Star);
    }

    #[test]
    fn classification_is_deterministic() {
        assert_eq!(classify(5.0, 150.0).unwrap(), classify(5.0, 150.0).unwrap());
    }

    #[test]
    fn degenerate_detections_are_unclassifiable() {
        assert!(matches!(
            classify(20_000.0, 0.0),
            Err(PipelineError::UnclassifiableObject { .. })
        ));
        assert!(matches!(
            classify(50.0, -1.0),
            Err(PipelineError::UnclassifiableObject { .. })
        ));
    }
}
