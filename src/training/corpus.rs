//! Built-in demographic training corpus.
//!
//! Similar pairs are every combination of variants within one category;
//! dissimilar pairs combine demographic variants with non-demographic field
//! names, plus a few random cross-category samples. Generation is
//! deterministic for a given seed.

use rand::rngs::StdRng;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// A named group of field-name variants that should embed close together.
#[derive(Debug, Clone, Copy)]
pub struct FieldCategory {
    pub name: &'static str,
    pub variants: &'static [&'static str],
}

pub const DEMOGRAPHIC_CATEGORIES: &[FieldCategory] = &[
    FieldCategory {
        name: "name",
        variants: &[
            "embossedName",
            "embossed_name",
            "EMBOSSED_NAME",
            "firstName",
            "first_name",
            "FIRST_NAME",
            "fname",
            "givenName",
            "lastName",
            "last_name",
            "LAST_NAME",
            "lname",
            "surname",
            "familyName",
            "middleName",
            "middle_name",
            "MIDDLE_NAME",
            "mname",
            "fullName",
            "full_name",
            "FULL_NAME",
            "completeName",
            "cardEmbossedName",
            "card_embossed_name",
            "embossedCompanyName",
        ],
    },
    FieldCategory {
        name: "ssn",
        variants: &[
            "ssn",
            "SSN",
            "social_security_number",
            "socialSecurityNumber",
            "SOCIAL_SECURITY_NUMBER",
            "tax_id",
            "taxId",
            "TAX_ID",
            "nationalId",
            "national_id",
            "NATIONAL_ID",
        ],
    },
    FieldCategory {
        name: "dob",
        variants: &[
            "dob",
            "DOB",
            "dateOfBirth",
            "date_of_birth",
            "DATE_OF_BIRTH",
            "birthDate",
            "birth_date",
            "BIRTH_DATE",
            "birthdate",
            "customerDOB",
            "customer_dob",
            "clientBirthDate",
        ],
    },
    FieldCategory {
        name: "gender",
        variants: &[
            "gender",
            "GENDER",
            "sex",
            "SEX",
            "genderCode",
            "gender_code",
            "GENDER_CODE",
            "sexCode",
            "sex_code",
        ],
    },
    FieldCategory {
        name: "race",
        variants: &[
            "race",
            "RACE",
            "ethnicity",
            "ETHNICITY",
            "raceCode",
            "race_code",
            "RACE_CODE",
            "ethnicityCode",
            "ethnicity_code",
        ],
    },
    FieldCategory {
        name: "marital_status",
        variants: &[
            "maritalStatus",
            "marital_status",
            "MARITAL_STATUS",
            "marriageStatus",
            "marriage_status",
            "maritalStatusCode",
            "marital_status_code",
        ],
    },
    FieldCategory {
        name: "address",
        variants: &[
            "address",
            "ADDRESS",
            "streetAddress",
            "street_address",
            "addressLine1",
            "address_line_1",
            "addr1",
            "homeAddress",
            "home_address",
            "residentialAddress",
            "mailingAddress",
            "mailing_address",
        ],
    },
    FieldCategory {
        name: "city",
        variants: &[
            "city",
            "CITY",
            "cityName",
            "city_name",
            "municipality",
            "townCity",
            "town_city",
        ],
    },
    FieldCategory {
        name: "state",
        variants: &[
            "state",
            "STATE",
            "stateCode",
            "state_code",
            "province",
            "PROVINCE",
            "region",
            "REGION",
        ],
    },
    FieldCategory {
        name: "zip",
        variants: &[
            "zip",
            "ZIP",
            "zipCode",
            "zip_code",
            "ZIP_CODE",
            "postalCode",
            "postal_code",
            "POSTAL_CODE",
            "postcode",
            "pincode",
            "PIN_CODE",
        ],
    },
    FieldCategory {
        name: "phone",
        variants: &[
            "phone",
            "PHONE",
            "phoneNumber",
            "phone_number",
            "PHONE_NUMBER",
            "mobileNumber",
            "mobile_number",
            "cellPhone",
            "cell_phone",
            "homePhone",
            "home_phone",
            "workPhone",
            "work_phone",
            "telephoneNumber",
            "telephone_number",
        ],
    },
    FieldCategory {
        name: "email",
        variants: &[
            "email",
            "EMAIL",
            "emailAddress",
            "email_address",
            "EMAIL_ADDRESS",
            "emailAddr",
            "email_addr",
            "e_mail",
            "eMail",
        ],
    },
    FieldCategory {
        name: "income",
        variants: &[
            "income",
            "INCOME",
            "annualIncome",
            "annual_income",
            "salary",
            "SALARY",
            "wages",
            "earnings",
            "totalIncome",
            "total_income",
            "householdIncome",
        ],
    },
    FieldCategory {
        name: "account",
        variants: &[
            "accountNumber",
            "account_number",
            "ACCOUNT_NUMBER",
            "acctNum",
            "accountId",
            "account_id",
            "ACCOUNT_ID",
            "bankAccount",
            "bank_account",
        ],
    },
    FieldCategory {
        name: "card",
        variants: &[
            "cardNumber",
            "card_number",
            "CARD_NUMBER",
            "creditCardNumber",
            "cardId",
            "card_id",
            "panNumber",
            "pan_number",
            "debitCardNumber",
            "debit_card_number",
        ],
    },
    FieldCategory {
        name: "license",
        variants: &[
            "driversLicense",
            "drivers_license",
            "DRIVERS_LICENSE",
            "licenseNumber",
            "license_number",
            "dlNumber",
            "dl_number",
            "drivingLicense",
            "driving_license",
        ],
    },
    FieldCategory {
        name: "passport",
        variants: &[
            "passport",
            "PASSPORT",
            "passportNumber",
            "passport_number",
            "PASSPORT_NUMBER",
            "passportId",
            "passport_id",
        ],
    },
    FieldCategory {
        name: "citizen",
        variants: &[
            "citizenship",
            "CITIZENSHIP",
            "citizenshipStatus",
            "nationality",
            "NATIONALITY",
            "countryOfCitizenship",
        ],
    },
    FieldCategory {
        name: "disability",
        variants: &[
            "disability",
            "DISABILITY",
            "disabilityStatus",
            "disabilityCode",
            "disability_code",
            "handicap",
        ],
    },
    FieldCategory {
        name: "veteran",
        variants: &[
            "veteran",
            "VETERAN",
            "veteranStatus",
            "veteran_status",
            "militaryService",
            "military_service",
        ],
    },
];

/// Field names that carry no demographic meaning; used as negatives.
pub const NON_DEMOGRAPHIC_FIELDS: &[&str] = &[
    "transactionId",
    "transaction_id",
    "orderId",
    "order_id",
    "productCode",
    "product_code",
    "itemNumber",
    "item_number",
    "quantity",
    "price",
    "amount",
    "total",
    "subtotal",
    "createdDate",
    "created_date",
    "updatedDate",
    "updated_date",
    "status",
    "statusCode",
    "active",
    "enabled",
    "deleted",
    "description",
    "notes",
    "comments",
    "remarks",
    "category",
    "type",
    "kind",
    "class",
    "group",
    "version",
    "revision",
    "sequence",
    "index",
    "position",
    "url",
    "link",
    "path",
    "file",
    "filename",
    "hash",
    "token",
    "key",
    "secret",
    "password",
    "metadata",
    "config",
    "settings",
    "preferences",
];

/// Demographic variants (in category order) paired against every sampled negative.
const DEMOGRAPHIC_NEGATIVE_SAMPLE: usize = 50;
const NON_DEMOGRAPHIC_NEGATIVE_SAMPLE: usize = 30;
/// Random cross-category pairs drawn per category combination.
const CROSS_CATEGORY_SAMPLES: usize = 3;

/// Similar and dissimilar training pairs.
///
/// Serialises as `{"similar": [[a, b], ...], "dissimilar": [[a, b], ...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairSet {
    pub similar: Vec<(String, String)>,
    pub dissimilar: Vec<(String, String)>,
}

impl PairSet {
    /// Keep at most `max_similar` / `max_dissimilar` pairs from the front of each list.
    pub fn truncate(&mut self, max_similar: usize, max_dissimilar: usize) {
        self.similar.truncate(max_similar);
        self.dissimilar.truncate(max_dissimilar);
    }

    pub fn len(&self) -> usize {
        self.similar.len() + self.dissimilar.len()
    }

    pub fn is_empty(&self) -> bool {
        self.similar.is_empty() && self.dissimilar.is_empty()
    }
}

fn pair(a: &str, b: &str) -> (String, String) {
    (a.to_string(), b.to_string())
}

/// Generate the demographic corpus, shuffled with a `StdRng` seeded by `seed`.
pub fn demographic_pairs(seed: u64) -> PairSet {
    let mut rng = StdRng::seed_from_u64(seed);

    let mut similar = Vec::new();
    for category in DEMOGRAPHIC_CATEGORIES {
        let variants = category.variants;
        for (i, a) in variants.iter().enumerate() {
            for b in &variants[i + 1..] {
                similar.push(pair(a, b));
            }
        }
    }

    let mut dissimilar = Vec::new();
    let all_demographic = DEMOGRAPHIC_CATEGORIES
        .iter()
        .flat_map(|c| c.variants.iter().copied());
    for demo in all_demographic.take(DEMOGRAPHIC_NEGATIVE_SAMPLE) {
        for other in NON_DEMOGRAPHIC_FIELDS.iter().take(NON_DEMOGRAPHIC_NEGATIVE_SAMPLE) {
            dissimilar.push(pair(demo, other));
        }
    }

    for (i, first) in DEMOGRAPHIC_CATEGORIES.iter().enumerate() {
        for second in &DEMOGRAPHIC_CATEGORIES[i + 1..] {
            let samples = CROSS_CATEGORY_SAMPLES
                .min(first.variants.len())
                .min(second.variants.len());
            for _ in 0..samples {
                if let (Some(a), Some(b)) = (
                    first.variants.choose(&mut rng),
                    second.variants.choose(&mut rng),
                ) {
                    dissimilar.push(pair(a, b));
                }
            }
        }
    }

    similar.shuffle(&mut rng);
    dissimilar.shuffle(&mut rng);

    tracing::debug!(
        similar = similar.len(),
        dissimilar = dissimilar.len(),
        "generated demographic corpus"
    );

    PairSet {
        similar,
        dissimilar,
    }
}

/// Category whose variants contain `field_name` (case-insensitive), if any.
pub fn category_of(field_name: &str) -> Option<&'static str> {
    DEMOGRAPHIC_CATEGORIES
        .iter()
        .find(|c| c.variants.iter().any(|v| v.eq_ignore_ascii_case(field_name)))
        .map(|c| c.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn combinations(n: usize) -> usize {
        n * (n - 1) / 2
    }

    #[test]
    fn similar_pairs_cover_every_combination() {
        let pairs = demographic_pairs(0);
        let expected: usize = DEMOGRAPHIC_CATEGORIES
            .iter()
            .map(|c| combinations(c.variants.len()))
            .sum();
        assert_eq!(pairs.similar.len(), expected);
    }

    #[test]
    fn dissimilar_pair_count() {
        let pairs = demographic_pairs(0);
        let n = DEMOGRAPHIC_CATEGORIES.len();
        let cross = combinations(n) * CROSS_CATEGORY_SAMPLES;
        assert_eq!(
            pairs.dissimilar.len(),
            DEMOGRAPHIC_NEGATIVE_SAMPLE * NON_DEMOGRAPHIC_NEGATIVE_SAMPLE + cross
        );
    }

    #[test]
    fn similar_pairs_share_a_category() {
        let pairs = demographic_pairs(3);
        for (a, b) in pairs.similar.iter().take(50) {
            assert_eq!(category_of(a), category_of(b), "{a} / {b}");
        }
    }

    #[test]
    fn generation_is_deterministic_per_seed() {
        assert_eq!(demographic_pairs(42), demographic_pairs(42));
        assert_ne!(demographic_pairs(42).similar, demographic_pairs(43).similar);
    }

    #[test]
    fn truncate_limits_both_lists() {
        let mut pairs = demographic_pairs(1);
        pairs.truncate(10, 20);
        assert_eq!(pairs.similar.len(), 10);
        assert_eq!(pairs.dissimilar.len(), 20);
        assert_eq!(pairs.len(), 30);
    }

    #[test]
    fn pair_set_json_shape() {
        let json = r#"{"similar": [["ssn", "SSN"]], "dissimilar": [["ssn", "price"]]}"#;
        let pairs: PairSet = serde_json::from_str(json).unwrap();
        assert_eq!(pairs.similar, vec![pair("ssn", "SSN")]);
        assert_eq!(pairs.dissimilar, vec![pair("ssn", "price")]);
    }
}
