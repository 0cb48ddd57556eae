//! Persona synthesis. Each synthetic participant gets an origin, a life
//! stage, a pain point, a speaking style, a quirk and a hidden flexibility
//! score, drawn from sets allowed for its role.

use rand::seq::SliceRandom;
use rand::Rng;
use sim_core::{CharacterRegistry, Persona, RoleId, Scenario};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Origin {
    LocalDeep,
    LocalRecent,
    Outsider,
}

impl Origin {
    fn stories(self) -> &'static [&'static str] {
        match self {
            Origin::LocalDeep => &[
                "Was born in Bermondsey to a family that worked the docks for generations.",
                "Has lived in the borough for forty years and remembers it as a wasteland.",
                "Took over a council tenancy from a grandmother.",
            ],
            Origin::LocalRecent => &[
                "Arrived five years ago, drawn by the up-and-coming feel of the area.",
                "Bought a flat in the first phase of the development and half regrets it.",
                "Rents a room in a shared warehouse nearby.",
            ],
            Origin::Outsider => &[
                "Commutes in from West London and sees the site purely as a workplace.",
                "Comes from abroad and treats London as a global investment board.",
                "Has only just moved to the city and feels nothing for its history.",
            ],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Pain {
    Precariat,
    MiddleClass,
    SingleParent,
    Wealthy,
    Corporate,
}

impl Pain {
    fn worries(self) -> &'static [&'static str] {
        match self {
            Pain::Precariat => &[
                "Rent rises that would force them out.",
                "The cheap markets and food banks they rely on disappearing.",
                "Social cleansing and the loss of their support network.",
            ],
            Pain::MiddleClass => &[
                "Negative equity on the mortgage.",
                "The character of the neighbourhood changing too fast.",
                "Construction noise wrecking a work-from-home routine.",
            ],
            Pain::SingleParent => &[
                "Rising crime putting their children at risk.",
                "Childcare becoming unaffordable.",
                "Losing their home to gentrification pressure.",
            ],
            Pain::Wealthy => &[
                "New towers overshadowing the penthouse view.",
                "Exclusive amenities losing their exclusivity.",
                "The scheme attracting anti-social behaviour.",
            ],
            Pain::Corporate => &[
                "The project becoming financially unviable.",
                "Bad press and damage to the brand.",
                "Endless planning delays killing the momentum.",
            ],
        }
    }
}

struct LifeStage {
    stage: &'static str,
    focus: &'static str,
    tone: &'static str,
}

const LIFE_STAGES: &[LifeStage] = &[
    LifeStage {
        stage: "Teenager (14-18)",
        focus: "things to do and places to go",
        tone: "Neutral",
    },
    LifeStage {
        stage: "Young Adult (20s)",
        focus: "affordability, nightlife and job opportunities",
        tone: "Energetic or anxious",
    },
    LifeStage {
        stage: "Parent with Young Kids (30s-40s)",
        focus: "safety, schools, air quality and noise",
        tone: "Protective and tired",
    },
    LifeStage {
        stage: "Career Peak (40s-50s)",
        focus: "property value, status, convenience and speed",
        tone: "Confident and demanding",
    },
    LifeStage {
        stage: "Retiree (60s+)",
        focus: "healthcare, community access, quiet and heritage",
        tone: "Nostalgic or stubborn",
    },
];

/// Voice instructions for one speaking style.
#[derive(Debug, PartialEq, Eq)]
pub struct StyleGuide {
    pub key: &'static str,
    pub description: &'static str,
    pub keywords: &'static [&'static str],
    pub grammar: &'static str,
}

const STYLES: &[StyleGuide] = &[
    StyleGuide {
        key: "academic",
        description: "Intellectual, structured, fond of jargon.",
        keywords: &["implications", "gentrification", "paradigm", "spatial", "socio-economic"],
        grammar: "Long sentences, passive voice, cites studies.",
    },
    StyleGuide {
        key: "street",
        description: "Informal and direct, local slang, raw emotion.",
        keywords: &["mate", "rubbish", "proper", "joke", "listen", "innit"],
        grammar: "Short bursts, rhetorical questions, colloquialisms.",
    },
    StyleGuide {
        key: "corporate",
        description: "Polished, evasive, heavy on buzzwords.",
        keywords: &["synergy", "deliverability", "stakeholders", "alignment", "robust"],
        grammar: "Diplomatic and firm, never a direct no.",
    },
    StyleGuide {
        key: "nimby",
        description: "Defensive, legalistic, obsessed with detail.",
        keywords: &["precedent", "overshadowing", "compliance", "policy 3.2", "density"],
        grammar: "Formal complaints, cites the rules, sceptical.",
    },
    StyleGuide {
        key: "activist",
        description: "Moralising, urgent, rallying.",
        keywords: &["justice", "community", "greed", "displacement", "crisis"],
        grammar: "Exclamations, calls to action, good versus evil.",
    },
];

const QUIRKS: &[&str] = &[
    "Keeps bringing up their dog and its need for grass.",
    "Obsessed with sunlight and vitamin D.",
    "Deeply cynical; assumes everyone is lying.",
    "Uses war metaphors for everything.",
    "Very polite but completely unmovable.",
    "Keeps citing a failed scheme nearby as a warning.",
    "Speaks very briefly.",
    "Wants to be everyone's friend and dithers under conflict.",
    "Loves the nuances and trade-offs of every decision.",
    "Always steers the talk to collective and community impact.",
    "Thinks in terms of long-term sustainability and fairness between generations.",
    "Values local history and cultural preservation.",
];

/// Which traits a role may draw from.
struct Archetype {
    origins: &'static [Origin],
    pains: &'static [Pain],
    styles: &'static [&'static str],
    flexibility: (u8, u8),
}

const OPEN_ARCHETYPE: Archetype = Archetype {
    origins: &[Origin::LocalDeep, Origin::LocalRecent, Origin::Outsider],
    pains: &[Pain::Precariat, Pain::MiddleClass, Pain::Wealthy, Pain::Corporate],
    styles: &["street", "corporate", "academic", "nimby", "activist"],
    flexibility: (3, 8),
};

fn archetype(role: &RoleId) -> Archetype {
    match role.as_str() {
        "developer" => Archetype {
            origins: &[Origin::Outsider, Origin::LocalRecent],
            pains: &[Pain::Corporate],
            styles: &["corporate", "academic"],
            flexibility: (2, 6),
        },
        "community_activist" => Archetype {
            origins: &[Origin::LocalDeep, Origin::LocalRecent],
            pains: &[Pain::Precariat, Pain::MiddleClass, Pain::SingleParent],
            styles: &["activist", "street", "academic"],
            flexibility: (1, 5),
        },
        "council_planner" => Archetype {
            origins: &[Origin::Outsider, Origin::LocalRecent],
            pains: &[Pain::Corporate, Pain::MiddleClass],
            styles: &["corporate", "nimby", "academic"],
            flexibility: (4, 8),
        },
        "resident_homeowner" => Archetype {
            origins: &[Origin::LocalDeep, Origin::LocalRecent],
            pains: &[Pain::MiddleClass, Pain::Wealthy, Pain::SingleParent],
            styles: &["nimby", "street", "corporate"],
            flexibility: (3, 7),
        },
        "resident_social" => Archetype {
            origins: &[Origin::LocalDeep],
            pains: &[Pain::Precariat, Pain::SingleParent],
            styles: &["street", "activist", "nimby"],
            flexibility: (1, 6),
        },
        "potential_buyer" => Archetype {
            origins: &[Origin::Outsider, Origin::LocalRecent],
            pains: &[Pain::MiddleClass, Pain::Wealthy],
            styles: &["corporate", "academic"],
            flexibility: (5, 9),
        },
        "urban_designer" => Archetype {
            origins: &[Origin::Outsider, Origin::LocalRecent, Origin::LocalDeep],
            pains: &[Pain::MiddleClass, Pain::Corporate],
            styles: &["academic", "corporate"],
            flexibility: (4, 8),
        },
        _ => OPEN_ARCHETYPE,
    }
}

/// Look up the voice instructions for a style key.
pub fn style_guide(key: &str) -> Option<&'static StyleGuide> {
    STYLES.iter().find(|s| s.key == key)
}

fn pick<'a, T, R: Rng + ?Sized>(items: &'a [T], fallback: &'a T, rng: &mut R) -> &'a T {
    items.choose(rng).unwrap_or(fallback)
}

fn lower_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) => c.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Draw a persona for a participant of `role`. Unknown roles draw from every
/// trait.
pub fn synthesize_persona<R: Rng + ?Sized>(role: &RoleId, role_name: &str, rng: &mut R) -> Persona {
    let arch = archetype(role);
    let origin = *pick(arch.origins, &Origin::LocalRecent, rng);
    let story = *pick(origin.stories(), &"", rng);
    let stage = pick(LIFE_STAGES, &LIFE_STAGES[0], rng);
    let pain = *pick(arch.pains, &Pain::MiddleClass, rng);
    let worry = *pick(pain.worries(), &"", rng);
    let style = *pick(arch.styles, &"corporate", rng);
    let quirk = *pick(QUIRKS, &"", rng);
    let (lo, hi) = arch.flexibility;
    let flexibility = rng.gen_range(lo..=hi);

    let bio = format!(
        "I am a {} who {} Right now I care most about {}. What worries me about this project is {}",
        stage.stage,
        lower_first(story),
        stage.focus,
        lower_first(worry),
    );
    Persona {
        summary: format!("{role_name} ({style}, {})", stage.stage),
        bio,
        style: style.to_string(),
        pain_point: worry.to_string(),
        quirk: format!("{quirk} Tone: {}.", stage.tone),
        flexibility,
    }
}

/// Give every synthetic participant without a persona a freshly drawn one.
pub fn assign_personas<R: Rng + ?Sized>(
    scenario: &Scenario,
    registry: &mut CharacterRegistry,
    rng: &mut R,
) {
    for p in registry.iter_mut().filter(|p| !p.is_human && p.persona.is_none()) {
        let role_name = scenario
            .role(&p.role)
            .map(|r| r.name.as_str())
            .unwrap_or(p.role.as_str());
        let persona = synthesize_persona(&p.role, role_name, rng);
        debug!(participant = %p.id, summary = %persona.summary, "persona synthesized");
        p.persona = Some(persona);
    }
}
