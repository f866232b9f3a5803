//! Action unit catalog
//!
//! Static FACS reference data: what each AU code does and which muscle drives it.

/// Description used for AU codes missing from the catalog
pub const UNKNOWN_DESCRIPTION: &str = "Unknown Action Unit";

/// Muscle group used for AU codes missing from the catalog
pub const UNKNOWN_MUSCLE_GROUP: &str = "Unknown muscle group";

/// Human-readable name of an action unit
pub fn description(au_code: &str) -> &'static str {
    match au_code {
        "AU01" => "Inner Brow Raiser",
        "AU02" => "Outer Brow Raiser",
        "AU04" => "Brow Lowerer",
        "AU05" => "Upper Lid Raiser",
        "AU06" => "Cheek Raiser",
        "AU07" => "Lid Tightener",
        "AU09" => "Nose Wrinkler",
        "AU10" => "Upper Lip Raiser",
        "AU11" => "Nasolabial Deepener",
        "AU12" => "Lip Corner Puller",
        "AU13" => "Sharp Lip Puller",
        "AU14" => "Dimpler",
        "AU15" => "Lip Corner Depressor",
        "AU16" => "Lower Lip Depressor",
        "AU17" => "Chin Raiser",
        "AU18" => "Lip Puckerer",
        "AU20" => "Lip Stretcher",
        "AU22" => "Lip Funneler",
        "AU23" => "Lip Tightener",
        "AU24" => "Lip Pressor",
        "AU25" => "Lips Part",
        "AU26" => "Jaw Drop",
        "AU27" => "Mouth Stretch",
        "AU28" => "Lip Suck",
        _ => UNKNOWN_DESCRIPTION,
    }
}

/// Facial muscle(s) responsible for an action unit
pub fn muscle_group(au_code: &str) -> &'static str {
    match au_code {
        "AU01" => "corrugator supercilii (medial)",
        "AU02" => "frontalis (lateral)",
        "AU04" => "corrugator supercilii, depressor supercilii",
        "AU05" => "levator palpebrae superioris",
        "AU06" => "orbicularis oculi (pars orbitalis)",
        "AU07" => "orbicularis oculi (pars palpebralis)",
        "AU09" => "levator labii superioris alaeque nasi",
        "AU10" => "levator labii superioris",
        "AU12" => "zygomaticus major",
        "AU15" => "depressor anguli oris",
        "AU17" => "mentalis",
        "AU20" => "risorius",
        "AU23" | "AU28" => "orbicularis oris",
        "AU25" => "depressor labii inferioris",
        "AU26" => "masseter (relaxed)",
        _ => UNKNOWN_MUSCLE_GROUP,
    }
}

/// Normalize detector-specific AU column names ("AU1", "au12_r") to "AU01"/"AU12"
///
/// Returns `None` for names that are not AU intensity columns (e.g. "AU12_c"
/// occurrence flags).
pub fn canonical_code(raw: &str) -> Option<String> {
    let upper = raw.trim().to_uppercase();
    let rest = upper.strip_prefix("AU")?;
    let digits = rest.strip_suffix("_R").unwrap_or(rest);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let number: u32 = digits.parse().ok()?;
    Some(format!("AU{:02}", number))
}
