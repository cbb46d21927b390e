//! Reference compound table (NIST names, densities and mass fractions).

/// A named reference compound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Compound {
    pub name: &'static str,
    /// Nominal density (g/cm³).
    pub density: f64,
    /// (Z, mass fraction) pairs.
    pub composition: &'static [(u32, f64)],
}

const COMPOUNDS: &[Compound] = &[
    Compound {
        name: "Air, Dry (near sea level)",
        density: 1.204_79e-3,
        composition: &[(6, 0.000124), (7, 0.755268), (8, 0.231781), (18, 0.012827)],
    },
    Compound {
        name: "Water, Liquid",
        density: 1.0,
        composition: &[(1, 0.111894), (8, 0.888106)],
    },
    Compound {
        name: "Polymethyl Methacralate (Lucite, Perspex)",
        density: 1.19,
        composition: &[(1, 0.080538), (6, 0.599848), (8, 0.319614)],
    },
    Compound {
        name: "Tissue, Soft (ICRP)",
        density: 1.03,
        composition: &[
            (1, 0.104472),
            (6, 0.232190),
            (7, 0.024880),
            (8, 0.630238),
            (11, 0.001130),
            (12, 0.000130),
            (15, 0.001330),
            (16, 0.001990),
            (17, 0.001340),
            (19, 0.001990),
            (20, 0.000230),
            (26, 0.000050),
            (30, 0.000030),
        ],
    },
    Compound {
        name: "Bone, Cortical (ICRP)",
        density: 1.85,
        composition: &[
            (1, 0.047234),
            (6, 0.144330),
            (7, 0.041990),
            (8, 0.446096),
            (12, 0.002200),
            (15, 0.104970),
            (16, 0.003150),
            (20, 0.209930),
            (30, 0.000100),
        ],
    },
    Compound {
        name: "Polyethylene",
        density: 0.94,
        composition: &[(1, 0.143711), (6, 0.856289)],
    },
    Compound {
        name: "Aluminum Oxide",
        density: 3.97,
        composition: &[(8, 0.470749), (13, 0.529251)],
    },
    Compound {
        name: "Glass, Lead",
        density: 6.22,
        composition: &[
            (8, 0.156453),
            (14, 0.080866),
            (22, 0.008092),
            (33, 0.002651),
            (82, 0.751938),
        ],
    },
];

/// Finds a compound by its exact reference name.
pub fn by_name(name: &str) -> Option<&'static Compound> {
    COMPOUNDS.iter().find(|c| c.name == name)
}

/// Names of all compounds in the reference table.
pub fn names() -> impl Iterator<Item = &'static str> {
    COMPOUNDS.iter().map(|c| c.name)
}
