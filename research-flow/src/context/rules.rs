//! Declarative extraction tables for the context engine.
//!
//! Every extractor in [`super::engine`] is driven by an ordered table in this
//! module: keyword lists for category matching, compiled regexes for
//! structured values, and `(pattern, emit)` rules for exam findings. Clinical
//! narratives arrive in Spanish or English, so every table carries both
//! vocabularies (accented and unaccented Spanish spellings included).

use std::sync::LazyLock;

use regex::Regex;

use super::model::{ClinicalCourse, ClinicalFindings, OnsetPattern, RedFlagUrgency};

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid extraction pattern")
}

// ---------------------------------------------------------------------------
// Symptoms
// ---------------------------------------------------------------------------

pub(crate) struct SymptomRule {
    /// Canonical symptom name recorded in the context.
    pub category: &'static str,
    /// Lowercase substrings that emit this symptom. Ordered specific-first;
    /// the earliest match in the text anchors the severity/laterality window.
    pub keywords: &'static [&'static str],
}

pub(crate) const SYMPTOM_RULES: &[SymptomRule] = &[
    SymptomRule {
        category: "vision loss",
        keywords: &[
            "vision loss",
            "loss of vision",
            "pérdida de visión",
            "perdida de vision",
            "pérdida de la visión",
            "perdida de la vision",
            "pérdida visual",
            "perdida visual",
            "no veo",
            "no ve ",
            "dejó de ver",
            "dejo de ver",
            "cannot see",
            "can't see",
            "amaurosis",
            "ceguera",
            "blindness",
        ],
    },
    SymptomRule {
        category: "blurred vision",
        keywords: &[
            "blurred vision",
            "blurry vision",
            "visión borrosa",
            "vision borrosa",
            "borrosidad",
            "ve borroso",
            "veo borroso",
        ],
    },
    SymptomRule {
        category: "eye pain",
        keywords: &[
            "eye pain",
            "ocular pain",
            "dolor ocular",
            "dolor de ojo",
            "dolor en el ojo",
            "pain in the eye",
            "painful eye",
            "ojo doloroso",
            "dolor",
            "pain",
        ],
    },
    SymptomRule {
        category: "redness",
        keywords: &[
            "red eye",
            "redness",
            "ojo rojo",
            "enrojecimiento",
            "hiperemia",
            "inyección conjuntival",
            "inyeccion conjuntival",
        ],
    },
    SymptomRule {
        category: "photophobia",
        keywords: &["photophobia", "fotofobia", "sensitive to light", "molestia con la luz"],
    },
    SymptomRule {
        category: "floaters",
        keywords: &["floaters", "moscas volantes", "miodesopsias", "manchas flotantes"],
    },
    SymptomRule {
        category: "flashes",
        keywords: &["flashes", "fotopsias", "destellos", "luces brillantes"],
    },
    SymptomRule {
        category: "double vision",
        keywords: &["double vision", "diplopia", "diplopía", "visión doble", "vision doble"],
    },
    SymptomRule {
        category: "halos",
        keywords: &["halos", "halo alrededor", "aros de luz"],
    },
    SymptomRule {
        category: "tearing",
        keywords: &["tearing", "watery eye", "lagrimeo", "epífora", "epifora"],
    },
    SymptomRule {
        category: "discharge",
        keywords: &["discharge", "secreción", "secrecion", "legaña", "legañas", "lagañas"],
    },
    SymptomRule {
        category: "foreign body sensation",
        keywords: &[
            "foreign body sensation",
            "sensación de cuerpo extraño",
            "sensacion de cuerpo extrano",
            "arenilla",
            "gritty",
        ],
    },
    SymptomRule {
        category: "itching",
        keywords: &["itching", "itchy", "picazón", "picazon", "picor", "comezón", "comezon"],
    },
    SymptomRule {
        category: "headache",
        keywords: &[
            "headache",
            "cefalea",
            "dolor de cabeza",
            "migraine",
            "migraña",
            "migrana",
            "jaqueca",
        ],
    },
    SymptomRule {
        category: "nausea",
        keywords: &["nausea", "náusea", "náuseas", "nauseas", "vómito", "vomito", "vomiting"],
    },
    SymptomRule {
        category: "visual field defect",
        keywords: &[
            "visual field",
            "campo visual",
            "tunnel vision",
            "visión en túnel",
            "vision en tunel",
            "curtain",
            "cortina",
            "sombra",
            "shadow",
            "scotoma",
            "escotoma",
        ],
    },
    SymptomRule {
        category: "swelling",
        keywords: &[
            "swelling",
            "swollen",
            "hinchazón",
            "hinchazon",
            "edema palpebral",
            "párpado hinchado",
            "parpado hinchado",
            "proptosis",
            "exoftalmos",
        ],
    },
    SymptomRule {
        category: "dry eye",
        keywords: &["dry eye", "dryness", "ojo seco", "sequedad ocular", "resequedad"],
    },
];

pub(crate) const SEVERE_MARKERS: &[&str] = &[
    "severe",
    "severa",
    "severo",
    "intense",
    "intenso",
    "intensa",
    "unbearable",
    "insoportable",
    "excruciating",
    "muy fuerte",
    "10/10",
    "worst",
    "terrible",
    "incapacitante",
    "debilitating",
];

pub(crate) const MODERATE_MARKERS: &[&str] = &[
    "moderate",
    "moderada",
    "moderado",
    "considerable",
    "notable",
    "significant",
    "significativo",
    "significativa",
    "fuerte",
    "marked",
    "marcado",
    "marcada",
];

pub(crate) struct QualityRule {
    pub quality: &'static str,
    pub markers: &'static [&'static str],
}

pub(crate) const QUALITY_RULES: &[QualityRule] = &[
    QualityRule {
        quality: "sharp",
        markers: &["sharp", "stabbing", "punzante", "lancinante", "como aguja"],
    },
    QualityRule {
        quality: "burning",
        markers: &["burning", "ardor", "quemazón", "quemazon", "quemante"],
    },
    QualityRule {
        quality: "throbbing",
        markers: &["throbbing", "pulsátil", "pulsatil", "pulsante", "palpitante"],
    },
    QualityRule {
        quality: "pressure",
        markers: &[
            "pressure",
            "presión en",
            "presion en",
            "opresivo",
            "opresiva",
            "tightness",
            "peso en el ojo",
        ],
    },
    QualityRule {
        quality: "dull",
        markers: &["dull", "sordo", "sorda", "aching"],
    },
    QualityRule {
        quality: "gritty",
        markers: &["gritty", "arenilla", "sandy", "como arena"],
    },
];

pub(crate) struct LateralityRule {
    pub pattern: Regex,
    pub location: &'static str,
}

/// Ordered: bilateral wording first so "ambos ojos" is not claimed by a
/// single-eye rule appearing later in the same window.
pub(crate) static LATERALITY_RULES: LazyLock<Vec<LateralityRule>> = LazyLock::new(|| {
    vec![
        LateralityRule {
            pattern: re(r"(?i)\b(?:both eyes|ambos ojos|bilateral|binocular|los dos ojos)\b"),
            location: "bilateral",
        },
        LateralityRule {
            pattern: re(r"(?i)\b(?:right eye|ojo derecho|o\.?d\.?)\b"),
            location: "right eye",
        },
        LateralityRule {
            pattern: re(r"(?i)\b(?:left eye|ojo izquierdo|o\.?i\.?|o\.?s\.?)\b"),
            location: "left eye",
        },
    ]
});

pub(crate) static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?i)\b\d{1,3}\s*(?:minutos?|minutes?|mins?|horas?|hours?|hrs?|h\b|días?|dias?|days?|semanas?|weeks?|meses?|months?|años?|anos?|years?|yrs?)\b")
});

// ---------------------------------------------------------------------------
// Demographics and history
// ---------------------------------------------------------------------------

pub(crate) static AGE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        re(r"(?i)\b(\d{1,3})\s*(?:years?\s*(?:old|of age)|yo\b|y/o|años|anos|año|ano)"),
        re(r"(?i)\b(?:age|edad)\s*[:=]?\s*(\d{1,3})\b"),
        re(r"(?i)\b(?:aged|de)\s+(\d{1,3})\s+(?:years|años|anos)\b"),
    ]
});

pub(crate) static MALE_RE: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?i)\b(?:male|man|hombre|varón|varon|masculino|señor|senor)\b")
});

pub(crate) static FEMALE_RE: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?i)\b(?:female|woman|mujer|femenina|femenino|señora|senora)\b")
});

pub(crate) struct RiskFactorRule {
    pub factor: &'static str,
    pub markers: &'static [&'static str],
}

pub(crate) const RISK_FACTOR_RULES: &[RiskFactorRule] = &[
    RiskFactorRule {
        factor: "diabetes",
        markers: &["diabetes", "diabética", "diabetica", "diabético", "diabetico", "diabetic"],
    },
    RiskFactorRule {
        factor: "hypertension",
        markers: &["hypertension", "hipertensión", "hipertension", "hipertenso", "hipertensa", "high blood pressure"],
    },
    RiskFactorRule {
        factor: "smoking",
        markers: &["smoker", "smoking", "fumador", "fumadora", "tabaquismo"],
    },
    RiskFactorRule {
        factor: "high myopia",
        markers: &["high myopia", "miopía alta", "miopia alta", "miopía magna", "miopia magna", "highly myopic"],
    },
    RiskFactorRule {
        factor: "glaucoma history",
        markers: &["glaucoma familiar", "family history of glaucoma", "antecedente de glaucoma", "antecedentes de glaucoma"],
    },
    RiskFactorRule {
        factor: "prior eye surgery",
        markers: &["eye surgery", "cirugía ocular", "cirugia ocular", "operado de la vista", "cataract surgery", "cirugía de catarata", "cirugia de catarata", "lasik"],
    },
    RiskFactorRule {
        factor: "contact lens wear",
        markers: &["contact lens", "contact lenses", "lentes de contacto", "lentillas"],
    },
    RiskFactorRule {
        factor: "corticosteroid use",
        markers: &["corticosteroid", "corticoides", "corticoide", "prednisona", "prednisone", "esteroides"],
    },
    RiskFactorRule {
        factor: "autoimmune disease",
        markers: &["autoimmune", "autoinmune", "lupus", "artritis reumatoide", "rheumatoid arthritis", "espondilitis", "ankylosing spondylitis"],
    },
    RiskFactorRule {
        factor: "ocular trauma history",
        markers: &["previous trauma", "trauma previo", "traumatismo previo", "golpe previo"],
    },
    RiskFactorRule {
        factor: "atrial fibrillation",
        markers: &["atrial fibrillation", "fibrilación auricular", "fibrilacion auricular"],
    },
    RiskFactorRule {
        factor: "cardiovascular disease",
        markers: &["cardiovascular", "cardiopatía", "cardiopatia", "infarto", "heart disease", "stroke", "ictus", "acv"],
    },
];

// ---------------------------------------------------------------------------
// Clinical findings (pattern, emit) rules
// ---------------------------------------------------------------------------

pub(crate) struct FindingRule {
    pub pattern: Regex,
    /// Capture group holding the value; 0 takes the whole match.
    pub group: usize,
    pub emit: fn(&mut ClinicalFindings, String),
}

fn set_visual_acuity(f: &mut ClinicalFindings, v: String) {
    f.visual_acuity = Some(v);
}
fn set_intraocular_pressure(f: &mut ClinicalFindings, v: String) {
    f.intraocular_pressure = Some(format!("{v} mmHg"));
}
fn set_pupil_response(f: &mut ClinicalFindings, v: String) {
    f.pupil_response = Some(v);
}
fn set_fundus_exam(f: &mut ClinicalFindings, v: String) {
    f.fundus_exam = Some(v);
}
fn set_imaging(f: &mut ClinicalFindings, v: String) {
    f.imaging = Some(v);
}
fn set_laboratory(f: &mut ClinicalFindings, v: String) {
    f.laboratory = Some(v);
}

pub(crate) static FINDING_RULES: LazyLock<Vec<FindingRule>> = LazyLock::new(|| {
    vec![
        FindingRule {
            pattern: re(
                r"(?i)\b(?:visual acuity|agudeza visual)\b[^\n]{0,15}?(20/\d{2,3}|6/\d{1,2}|counting fingers|cuenta dedos|hand motion|movimiento de manos|light perception|percepción de luz|percepcion de luz|no light perception|sin percepción de luz|sin percepcion de luz)",
            ),
            group: 1,
            emit: set_visual_acuity,
        },
        FindingRule {
            pattern: re(r"\b(20/\d{2,3})\b"),
            group: 1,
            emit: set_visual_acuity,
        },
        FindingRule {
            pattern: re(
                r"(?i)\b(?:counting fingers|cuenta dedos|hand motion|movimiento de manos|light perception only|solo percepción de luz|solo percepcion de luz)\b",
            ),
            group: 0,
            emit: set_visual_acuity,
        },
        FindingRule {
            pattern: re(
                r"(?i)\b(?:intraocular pressure|presión intraocular|presion intraocular|iop|pio)\b[^\n\d]{0,15}(\d{1,2})\b",
            ),
            group: 1,
            emit: set_intraocular_pressure,
        },
        FindingRule {
            pattern: re(r"(?i)\b(\d{1,2})\s*mm\s?hg\b"),
            group: 1,
            emit: set_intraocular_pressure,
        },
        FindingRule {
            pattern: re(
                r"(?i)\b(fixed(?:\s+and)?\s+(?:mid-)?dilated|mid-?dilated pupil|midriasis|mydriasis|miosis|anisocoria|rapd|marcus gunn|pupila\s+(?:fija|dilatada|no reactiva|perezosa)|non-?reactive pupil|sluggish pupil|afferent pupillary defect|defecto pupilar aferente)\b",
            ),
            group: 0,
            emit: set_pupil_response,
        },
        FindingRule {
            pattern: re(
                r"(?i)\b(papill?edema|edema de papila|papilitis|cherry[- ]red spot|mancha rojo cereza|retinal hemorrhages?|hemorragias? retinianas?|cotton[- ]wool|exudados?|exudates?|optic disc pallor|palidez papilar|disc cupping|excavación papilar|excavacion papilar|retinal detachment on exam|desprendimiento de retina al examen)\b",
            ),
            group: 0,
            emit: set_fundus_exam,
        },
        FindingRule {
            pattern: re(
                r"(?i)\b(?:oct|tomografía de coherencia óptica|tomografia de coherencia optica|fluorescein angiograph\w+|angiografía con fluoresceína|angiografia con fluoresceina|b-scan|ocular ultrasound|ecografía ocular|ecografia ocular|orbital ct|tac de órbita|tac de orbita|orbital mri|resonancia de órbita|resonancia de orbita)\b[^\n.]{0,80}",
            ),
            group: 0,
            emit: set_imaging,
        },
        FindingRule {
            pattern: re(
                r"(?i)\b(?:esr|vsg|velocidad de sedimentación|velocidad de sedimentacion|crp|pcr|proteína c reactiva|proteina c reactiva|hba1c|glucemia|blood glucose|leucocitosis|white cell count|platelet count|plaquetas)\b[^\n.]{0,60}",
            ),
            group: 0,
            emit: set_laboratory,
        },
    ]
});

// ---------------------------------------------------------------------------
// Red flags
// ---------------------------------------------------------------------------

pub(crate) struct RedFlagRule {
    pub pattern: Regex,
    pub finding: &'static str,
    pub significance: &'static str,
    pub action: &'static str,
    pub urgency: RedFlagUrgency,
}

fn flag(
    pattern: &str,
    finding: &'static str,
    significance: &'static str,
    action: &'static str,
    urgency: RedFlagUrgency,
) -> RedFlagRule {
    RedFlagRule {
        pattern: re(pattern),
        finding,
        significance,
        action,
        urgency,
    }
}

pub(crate) static RED_FLAG_RULES: LazyLock<Vec<RedFlagRule>> = LazyLock::new(|| {
    vec![
        flag(
            r"(?i)(?:sudden|súbita|subita|súbito|subito|repentina|repentino|abrupt|acute)[^\n.]{0,40}?(?:vision loss|loss of vision|pérdida de (?:la )?visión|perdida de (?:la )?vision|pérdida visual|perdida visual|ceguera|blindness|amaurosis|visión|vision\b|vista)|(?:vision loss|loss of vision|pérdida de (?:la )?visión|perdida de (?:la )?vision|pérdida visual|perdida visual)[^\n.]{0,30}(?:sudden|súbita|subita|repentina|abrupt)",
            "Sudden vision loss",
            "Possible retinal artery occlusion, retinal detachment, or giant cell arteritis",
            "Immediate ophthalmologic evaluation",
            RedFlagUrgency::Immediate,
        ),
        flag(
            r"(?i)(?:eye pain|dolor ocular|dolor de ojo|dolor en el ojo)[^\n]{0,80}?(?:nausea|náusea|nausea|vómito|vomito|vomiting|halos)|(?:nausea|náusea|vómito|vomito|vomiting|halos)[^\n]{0,80}?(?:eye pain|dolor ocular|dolor de ojo)",
            "Eye pain with nausea or halos",
            "Suggestive of acute angle-closure glaucoma",
            "Same-visit intraocular pressure measurement and urgent referral",
            RedFlagUrgency::Immediate,
        ),
        flag(
            r"(?i)(?:curtain|cortina|sombra que (?:avanza|sube|baja)|shadow (?:over|across|in) (?:the )?(?:vision|visual field|eye))",
            "Curtain over the visual field",
            "Suggestive of retinal detachment",
            "Urgent dilated fundus examination",
            RedFlagUrgency::Immediate,
        ),
        flag(
            r"(?i)(?:flashes|fotopsias|destellos)[^\n]{0,80}?(?:floaters|moscas volantes|miodesopsias)|(?:floaters|moscas volantes|miodesopsias)[^\n]{0,80}?(?:flashes|fotopsias|destellos)",
            "New flashes with floaters",
            "Possible retinal tear or early detachment",
            "Dilated fundus examination within 24 hours",
            RedFlagUrgency::SameDay,
        ),
        flag(
            r"(?i)(?:chemical|químic\w+|quimic\w+|\bálcali\b|\balcali\b|\balkali\b|\bácido\b|\bacido\b|acid (?:burn|splash)|lejía|lejia|bleach|cáustic\w+|caustic|salpicadura)",
            "Chemical exposure to the eye",
            "Ocular chemical burn until proven otherwise",
            "Immediate copious irrigation before any further evaluation",
            RedFlagUrgency::Immediate,
        ),
        flag(
            r"(?i)(?:trauma|traumatismo|golpe en el ojo|blunt injury|penetrating|penetrante|perforación|perforacion|herida ocular|open globe|hammering|martillando|grinding|esmerilando)",
            "Ocular trauma",
            "Risk of open-globe injury or retained intraocular foreign body",
            "Shield the eye and refer immediately; avoid pressure on the globe",
            RedFlagUrgency::Immediate,
        ),
        flag(
            r"(?i)(?:jaw claudication|claudicación mandibular|claudicacion mandibular|temporal (?:tenderness|headache)|dolor temporal|arteritis|polymyalgia|polimialgia|scalp tenderness|dolor en cuero cabelludo)",
            "Giant cell arteritis features",
            "Risk of rapid, bilateral, irreversible vision loss",
            "Urgent ESR/CRP and same-day specialist assessment",
            RedFlagUrgency::Immediate,
        ),
        flag(
            r"(?i)(?:thunderclap|worst headache|peor (?:dolor de cabeza|cefalea) de (?:su|mi) vida|cefalea (?:súbita|subita) (?:intensa|severa))",
            "Thunderclap headache",
            "Possible subarachnoid hemorrhage",
            "Emergency department referral",
            RedFlagUrgency::Immediate,
        ),
        flag(
            r"(?i)(?:stiff neck|rigidez de nuca|meningism\w*|fever with photophobia|fiebre con fotofobia)",
            "Meningeal signs",
            "Possible meningitis or encephalitis",
            "Emergency department referral",
            RedFlagUrgency::Immediate,
        ),
        flag(
            r"(?i)(?:recent (?:eye )?surgery|cirugía (?:ocular )?reciente|cirugia (?:ocular )?reciente|postoperatorio|post-?op)[^\n]{0,60}?(?:pain|dolor|vision|visión|redness|rojo|secreción|secrecion)",
            "Post-operative ocular symptoms",
            "Risk of endophthalmitis",
            "Same-day surgical review",
            RedFlagUrgency::Immediate,
        ),
        flag(
            r"(?i)\b(?:diplopia|diplopía|double vision|visión doble|vision doble)\b",
            "New-onset diplopia",
            "Possible cranial nerve palsy, orbital or neurologic process",
            "Neuro-ophthalmic evaluation within 24 hours",
            RedFlagUrgency::SameDay,
        ),
        flag(
            r"(?i)\bhalos?\b",
            "Halos around lights",
            "May reflect corneal edema from elevated intraocular pressure",
            "Intraocular pressure check within 24 hours",
            RedFlagUrgency::SameDay,
        ),
        flag(
            r"(?i)(?:transient (?:vision|visual) loss|amaurosis fugax|pérdida (?:de visión |visual )?transitoria|perdida (?:de vision |visual )?transitoria)",
            "Transient visual loss",
            "Possible embolic event with stroke risk",
            "Urgent vascular workup",
            RedFlagUrgency::SameDay,
        ),
        flag(
            r"(?i)(?:leukocoria|leucocoria|white pupil|pupila blanca|reflejo blanco)",
            "Leukocoria",
            "Retinoblastoma must be excluded in children",
            "Urgent ophthalmology referral",
            RedFlagUrgency::SameDay,
        ),
        flag(
            r"(?i)(?:progressive (?:visual )?field loss|pérdida progresiva de campo|perdida progresiva de campo|tunnel vision|visión en túnel|vision en tunel)",
            "Progressive visual field loss",
            "Possible chronic glaucoma or compressive lesion",
            "Formal visual field testing within one week",
            RedFlagUrgency::WithinWeek,
        ),
    ]
});

// ---------------------------------------------------------------------------
// Temporal pattern
// ---------------------------------------------------------------------------

pub(crate) static ONSET_RULES: LazyLock<Vec<(Regex, OnsetPattern)>> = LazyLock::new(|| {
    vec![
        (
            re(r"(?i)\b(?:sudden(?:ly)?|súbit[ao]|subit[ao]|repentin[ao]|de repente|abrupt(?:ly)?|brusc[ao](?:mente)?|acute onset|inicio agudo|agud[ao])\b"),
            OnsetPattern::Acute,
        ),
        (
            re(r"(?i)\b(?:subacute|subagud[ao]|(?:over|for) the (?:past|last) (?:few |\d{1,3}\s*)?(?:days?|weeks?)|en (?:los|las) últim[ao]s (?:días|dias|semanas)|en (?:los|las) ultim[ao]s (?:días|dias|semanas)|(?:desde )?hace (?:un[ao]s )?\d{0,3}\s*(?:días|dias|semanas?|days?|weeks?))\b"),
            OnsetPattern::Subacute,
        ),
        (
            re(r"(?i)\b(?:chronic|crónic[ao]|cronic[ao]|long-?standing|de larga (?:data|evolución|evolucion)|(?:desde )?hace (?:un[ao]s )?\d{0,3}\s*(?:meses|años|anos|months?|years?)|for (?:\d{1,3}\s*)?(?:months|years))\b"),
            OnsetPattern::Chronic,
        ),
        (
            re(r"(?i)\b(?:progressive(?:ly)?|progresiv[ao]|gradual(?:ly|mente)?|poco a poco|slowly worsening)\b"),
            OnsetPattern::Progressive,
        ),
    ]
});

pub(crate) static COURSE_RULES: LazyLock<Vec<(Regex, ClinicalCourse)>> = LazyLock::new(|| {
    vec![
        (
            re(r"(?i)\b(?:stable|estable|sin cambios|unchanged|no ha cambiado)\b"),
            ClinicalCourse::Stable,
        ),
        (
            re(r"(?i)\b(?:improving|mejorando|mejoría|mejoria|ha mejorado|getting better)\b"),
            ClinicalCourse::Improving,
        ),
        (
            re(r"(?i)\b(?:worsening|empeorando|ha empeorado|cada vez peor|getting worse|deteriorating|deterioro)\b"),
            ClinicalCourse::Worsening,
        ),
        (
            re(r"(?i)\b(?:fluctuating|fluctuante|va y viene|intermitente|intermittent|comes and goes|episódic[ao]|episodic[ao]|episodes)\b"),
            ClinicalCourse::Fluctuating,
        ),
    ]
});

// ---------------------------------------------------------------------------
// Anatomy
// ---------------------------------------------------------------------------

/// Fixed region set, in anatomical front-to-back order. Every
/// `MedicalContext` carries all five; extraction only flips `involved` and
/// accumulates the matched keywords as findings.
pub(crate) const ANATOMICAL_REGIONS: &[(&str, &[&str])] = &[
    (
        "anterior segment",
        &[
            "cornea",
            "córnea",
            "corneal",
            "conjunctiva",
            "conjuntiva",
            "conjunctival",
            "sclera",
            "esclera",
            "iris",
            "anterior chamber",
            "cámara anterior",
            "camara anterior",
            "hypopyon",
            "hipopión",
            "hipopion",
            "hyphema",
            "hipema",
            "keratitis",
            "queratitis",
            "uveitis anterior",
            "uveítis anterior",
            "angle closure",
            "ángulo cerrado",
            "angulo cerrado",
            "glaucoma",
        ],
    ),
    (
        "lens",
        &[
            "lens",
            "cristalino",
            "cataract",
            "catarata",
            "pseudophakic",
            "pseudofáquico",
            "pseudofaquico",
            "aphakic",
            "afáquico",
            "afaquico",
            "intraocular lens",
            "lente intraocular",
        ],
    ),
    (
        "posterior segment",
        &[
            "retina",
            "retinal",
            "retiniana",
            "retiniano",
            "macula",
            "mácula",
            "macular",
            "vitreous",
            "vítreo",
            "vitreo",
            "detachment",
            "desprendimiento",
            "vein occlusion",
            "oclusión venosa",
            "oclusion venosa",
            "artery occlusion",
            "oclusión arterial",
            "oclusion arterial",
            "retinopathy",
            "retinopatía",
            "retinopatia",
            "maculopathy",
            "maculopatía",
            "maculopatia",
        ],
    ),
    (
        "optic nerve",
        &[
            "optic nerve",
            "nervio óptico",
            "nervio optico",
            "optic disc",
            "papila",
            "papilledema",
            "papiledema",
            "optic neuritis",
            "neuritis óptica",
            "neuritis optica",
            "neuropathy",
            "neuropatía",
            "neuropatia",
            "arteritis",
        ],
    ),
    (
        "orbit and adnexa",
        &[
            "orbit",
            "órbita",
            "orbita",
            "orbital",
            "eyelid",
            "párpado",
            "parpado",
            "palpebral",
            "lacrimal",
            "lagrimal",
            "proptosis",
            "exoftalmos",
            "cellulitis",
            "celulitis",
            "chalazion",
            "chalazión",
            "orzuelo",
            "stye",
            "ptosis",
        ],
    ),
];

// ---------------------------------------------------------------------------
// Diagnoses
// ---------------------------------------------------------------------------

/// Label line that introduces a diagnosis, with the candidate on the same
/// line after the separator. An empty remainder marks a differential header
/// whose candidates follow as list items.
pub(crate) static DIAGNOSIS_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?im)^[^\S\n]*(?:[-*•]\s*)?(?:\d+[.)]\s*)?\**(?:diagnóstico diferencial|diagnostico diferencial|diferenciales|differential diagnos(?:is|es)|diagnóstico más probable|diagnostico mas probable|most likely diagnosis|impresión diagnóstica|impresion diagnostica|diagnostic impression|diagnóstico|diagnostico|diagnosis|dx)\**\s*[:\-]\s*(.*)$")
});

/// List item under a differential header: `1. ...`, `2) ...`, `- ...`.
pub(crate) static DIAGNOSIS_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"^\s*(?:\d{1,2}[.)]|[-*•])\s+(.+)$"));

pub(crate) const MOST_LIKELY_MARKERS: &[&str] = &[
    "most likely",
    "más probable",
    "mas probable",
    "very likely",
    "muy probable",
    "highly likely",
    "altamente probable",
    "principal",
    "primary diagnosis",
    "first on the differential",
];

pub(crate) const POSSIBLE_MARKERS: &[&str] = &[
    "possible",
    "posible",
    "podría",
    "podria",
    "could be",
    "may be",
    "considerar",
    "consider",
    "sospecha de",
    "suspected",
    "plausible",
    "a descartar",
];

pub(crate) const RULE_OUT_MARKERS: &[&str] = &[
    "rule out",
    "ruled out",
    "descartar",
    "descartado",
    "descartada",
    "se descarta",
    "unlikely",
    "poco probable",
    "improbable",
    "less likely",
    "menos probable",
    "to exclude",
    "excluir",
];

pub(crate) const DIAGNOSIS_EMERGENT_MARKERS: &[&str] = &[
    "emergency",
    "emergencia",
    "emergente",
    "emergent",
    "immediate",
    "inmediata",
    "inmediato",
];

pub(crate) const DIAGNOSIS_URGENT_MARKERS: &[&str] =
    &["urgent", "urgente", "prompt", "pronta", "same day", "mismo día", "mismo dia"];

pub(crate) static SUPPORTING_RE: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?i)(?:supporting evidence|evidencia a favor|hallazgos a favor|supported by|apoyado por|a favor|evidencia)\s*[:\-]\s*([^\n]+)")
});

pub(crate) static CONTRA_RE: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?i)(?:contraindications?|contraindicaciones|hallazgos en contra|argues against|against|en contra)\s*[:\-]\s*([^\n]+)")
});

pub(crate) static NEXT_STEPS_RE: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?i)(?:next steps?|próximos pasos|proximos pasos|siguiente paso|estudios sugeridos|workup|plan)\s*[:\-]\s*([^\n]+)")
});

// ---------------------------------------------------------------------------
// Evidence quality
// ---------------------------------------------------------------------------

/// Domains counted as high-quality evidence. Matched as substrings of the
/// lowercased source URI.
pub(crate) const HIGH_QUALITY_DOMAINS: &[&str] = &[
    "pubmed.ncbi.nlm.nih.gov",
    "ncbi.nlm.nih.gov",
    "nejm.org",
    "thelancet.com",
    "jamanetwork.com",
    "bmj.com",
    "nature.com",
    "sciencedirect.com",
    "cochranelibrary.com",
    "cochrane.org",
    "uptodate.com",
    "aao.org",
    "nice.org.uk",
    "who.int",
    "cdc.gov",
    "nih.gov",
    "mayoclinic.org",
    "medlineplus.gov",
    "springer.com",
    "wiley.com",
    "ophthalmologyjournal",
    "iovs.arvojournals.org",
];

/// Markers (URI or title) that suggest peer-reviewed material.
pub(crate) const PEER_REVIEW_MARKERS: &[&str] = &[
    "pubmed",
    "doi.org",
    "journal",
    "revista",
    "systematic review",
    "meta-analysis",
    "metaanálisis",
    "metaanalisis",
    "randomized",
    "cochrane",
    "arvojournals",
];
