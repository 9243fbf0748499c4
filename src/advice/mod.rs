// Advice requests
// Turns structured customer requests into retrieval questions


use std::fmt;

use serde::{Deserialize, Serialize};

const DEFAULT_POOL_TYPE: &str = "standard";
const DEFAULT_POOL_SIZE: &str = "moyenne";

/// Appended to every emergency answer, whatever the knowledge base returned
pub const EMERGENCY_CHECKLIST: &str = "\n\n⚠️ En cas d'urgence :\n\
- Interdire la baignade si la sécurité des baigneurs est en jeu\n\
- Couper l'alimentation électrique de l'équipement si nécessaire\n\
- Photographier le problème pour le diagnostic\n\
- Nous pouvons organiser une intervention d'urgence";

/// What is known about the customer's pool; passed explicitly with each request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolProfile {
    pub pool_type: Option<String>,
    pub pool_size: Option<String>,
}

impl PoolProfile {
    #[inline]
    pub fn new(pool_type: Option<String>, pool_size: Option<String>) -> Self {
        Self {
            pool_type: pool_type.filter(|t| !t.trim().is_empty()),
            pool_size: pool_size.filter(|s| !s.trim().is_empty()),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pool_type.is_none() && self.pool_size.is_none()
    }

    /// The question with the known profile fields appended
    #[inline]
    pub fn enrich(&self, question: &str) -> String {
        let mut enriched = question.to_string();
        if let Some(pool_type) = &self.pool_type {
            enriched = format!("{} Type de piscine: {}.", enriched, pool_type);
        }
        if let Some(pool_size) = &self.pool_size {
            enriched = format!("{} Taille: {}.", enriched, pool_size);
        }
        enriched
    }
}

/// A structured request for technical advice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdviceRequest {
    General { question: String },
    WaterChemistry { issue: String },
    Equipment { equipment: String, problem: String },
    Maintenance,
    Seasonal { season: String },
    Emergency { description: String },
}

impl AdviceRequest {
    /// The retrieval question for this request
    #[inline]
    pub fn question(&self, profile: &PoolProfile) -> String {
        match self {
            Self::General { question } => question.clone(),
            Self::WaterChemistry { issue } => {
                format!("Problème chimique eau piscine: {}", issue)
            }
            Self::Equipment { equipment, problem } => {
                format!("Problème équipement {}: {}", equipment, problem)
            }
            Self::Maintenance => format!(
                "Planning entretien piscine {} {}",
                profile.pool_type.as_deref().unwrap_or(DEFAULT_POOL_TYPE),
                profile.pool_size.as_deref().unwrap_or(DEFAULT_POOL_SIZE)
            ),
            Self::Seasonal { season } => format!("Entretien piscine saison {}", season),
            Self::Emergency { description } => format!("Urgence piscine: {}", description),
        }
    }

    #[inline]
    pub fn is_emergency(&self) -> bool {
        matches!(self, Self::Emergency { .. })
    }

    /// Decorate the engine's answer; only emergencies get the safety checklist
    #[inline]
    pub fn finish(&self, answer: String) -> String {
        if self.is_emergency() {
            answer + EMERGENCY_CHECKLIST
        } else {
            answer
        }
    }
}

impl fmt::Display for AdviceRequest {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::General { .. } => "general",
            Self::WaterChemistry { .. } => "water chemistry",
            Self::Equipment { .. } => "equipment",
            Self::Maintenance => "maintenance",
            Self::Seasonal { .. } => "seasonal",
            Self::Emergency { .. } => "emergency",
        };
        write!(f, "{}", kind)
    }
}
