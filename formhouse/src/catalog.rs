//! Static service catalog.
//!
//! The catalog is presentation data, defined at compile time and never
//! mutated: one descriptor per government-service category, each carrying the
//! document checklist shown to the user (or recharge sub-options for the
//! recharge service). The submission handler looks up display names here but
//! deliberately accepts unknown keys verbatim - the catalog is not an
//! allow-list.

/// One government-service category offered by the form.
#[derive(Debug, Clone, Copy)]
pub struct ServiceDescriptor {
    /// Unique key used in API requests and storage paths
    pub key: &'static str,
    /// Human-readable name, also used as the service folder name on Drive
    pub name: &'static str,
    pub icon: &'static str,
    pub description: &'static str,
    /// Ordered document checklist; empty for the recharge service
    pub documents: &'static [&'static str],
    pub category: &'static str,
    /// Recharge sub-options; empty for document services
    pub recharge_options: &'static [RechargeOption],
}

#[derive(Debug, Clone, Copy)]
pub struct RechargeOption {
    pub name: &'static str,
    pub icon: &'static str,
}

pub const SERVICES: &[ServiceDescriptor] = &[
    ServiceDescriptor {
        key: "pan",
        name: "PAN Card",
        icon: "🆔",
        description: "Apply for a new PAN card or update existing PAN card details",
        documents: &[
            "Photo (Passport size - 35mm x 45mm)",
            "Signature (on white paper)",
            "Aadhar Card (Copy)",
            "Address Proof (Aadhar/Utility Bill/Rent Agreement)",
            "Mother's Name",
            "Father's Name",
            "Husband's Full Name (if applicable)",
            "Phone Number",
            "Email Address",
        ],
        category: "identity",
        recharge_options: &[],
    },
    ServiceDescriptor {
        key: "aadhar",
        name: "Aadhar Card",
        icon: "🪪",
        description: "Apply for new Aadhar card, update details, or download e-Aadhar",
        documents: &[
            "Birth Certificate or School Certificate",
            "Photo (for new enrollment)",
            "Address Proof (Electricity Bill/Rent Agreement/Bank Statement)",
            "Identity Proof (PAN/Voter ID/Driving License)",
            "Phone Number",
            "Email Address",
        ],
        category: "identity",
        recharge_options: &[],
    },
    ServiceDescriptor {
        key: "scholarship",
        name: "Scholarship Forms",
        icon: "🎓",
        description: "Apply for various government scholarships (Post-Matric, Merit, etc.)",
        documents: &[
            "Income Certificate",
            "Caste Certificate (if applicable)",
            "Domicile Certificate",
            "Previous Year Marksheet",
            "Bank Account Details",
            "Aadhar Card",
            "Passport Size Photo",
            "School/College ID Card",
        ],
        category: "education",
        recharge_options: &[],
    },
    ServiceDescriptor {
        key: "caste",
        name: "Caste Certificate",
        icon: "📜",
        description: "Apply for or renew caste certificate",
        documents: &[
            "Birth Certificate",
            "School Leaving Certificate",
            "Father's/Mother's Caste Certificate",
            "Aadhar Card",
            "Ration Card (if available)",
            "Address Proof",
            "Passport Size Photo",
            "Affidavit (if required)",
        ],
        category: "certificate",
        recharge_options: &[],
    },
    ServiceDescriptor {
        key: "domicile",
        name: "Domicile Certificate",
        icon: "🏠",
        description: "Apply for domicile certificate of Maharashtra",
        documents: &[
            "Birth Certificate",
            "School Leaving Certificate (SSC/HSC)",
            "Aadhar Card",
            "Address Proof (Electricity Bill/Rent Agreement)",
            "Father's/Mother's Domicile Certificate (if available)",
            "Passport Size Photo",
            "Affidavit",
        ],
        category: "certificate",
        recharge_options: &[],
    },
    ServiceDescriptor {
        key: "ladkiBahin",
        name: "Ladki Bahin KYC",
        icon: "👩",
        description: "Complete KYC for Ladki Bahin Yojana scheme",
        documents: &[
            "Aadhar Card",
            "Bank Account Details",
            "Ration Card",
            "Income Certificate",
            "Caste Certificate (if applicable)",
            "Domicile Certificate",
            "Passport Size Photo",
            "Mobile Number (linked with Aadhar)",
            "Email Address",
        ],
        category: "scheme",
        recharge_options: &[],
    },
    ServiceDescriptor {
        key: "govtExam",
        name: "Government Exam Forms",
        icon: "📝",
        description: "Fill forms for various government exams (MPSC, UPSC, etc.)",
        documents: &[
            "Educational Certificates (10th, 12th, Graduation)",
            "Aadhar Card",
            "PAN Card",
            "Caste Certificate (if applicable)",
            "Domicile Certificate",
            "Passport Size Photo",
            "Signature",
            "Bank Account Details",
            "Email Address",
            "Phone Number",
        ],
        category: "exam",
        recharge_options: &[],
    },
    ServiceDescriptor {
        key: "recharge",
        name: "Recharge Services",
        icon: "📱",
        description: "Mobile, DTH, and other recharge services",
        documents: &[],
        category: "recharge",
        recharge_options: &[
            RechargeOption {
                name: "Mobile Recharge",
                icon: "📱",
            },
            RechargeOption {
                name: "DTH Recharge",
                icon: "📺",
            },
            RechargeOption {
                name: "Data Card",
                icon: "💾",
            },
            RechargeOption {
                name: "Electricity Bill",
                icon: "⚡",
            },
            RechargeOption {
                name: "Gas Bill",
                icon: "🔥",
            },
            RechargeOption {
                name: "Water Bill",
                icon: "💧",
            },
        ],
    },
];

/// Look up a service by key.
pub fn find(key: &str) -> Option<&'static ServiceDescriptor> {
    SERVICES.iter().find(|s| s.key == key)
}

/// Display name for a service key, falling back to the raw key for services
/// the catalog does not know about.
pub fn display_name(key: &str) -> &str {
    find(key).map(|s| s.name).unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_unique() {
        let mut keys: Vec<_> = SERVICES.iter().map(|s| s.key).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), SERVICES.len());
    }

    #[test]
    fn display_name_falls_back_to_key() {
        assert_eq!(display_name("pan"), "PAN Card");
        assert_eq!(display_name("passport"), "passport");
    }

    #[test]
    fn only_recharge_has_sub_options() {
        for service in SERVICES {
            if service.key == "recharge" {
                assert!(!service.recharge_options.is_empty());
                assert!(service.documents.is_empty());
            } else {
                assert!(service.recharge_options.is_empty());
                assert!(!service.documents.is_empty());
            }
        }
    }
}
