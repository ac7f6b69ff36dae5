//! Declarative description of the registration form.
//!
//! Each entry maps a field name to its semantic type, validation rules and
//! display hints. The validator walks this table and callers can fetch it to
//! build their own forms, so the rules live in exactly one place.

use serde::Serialize;

use super::domain::{
    BloodType, ChildStatus, Gender, Money, PreviousSchoolType, ReferenceSource, Religion,
    ResidenceStatus, Transportation, UniformSize,
};

/// Largest value a `decimal(12, 2)` income column can hold.
pub const MAX_INCOME: Money = Money::from_minor(999_999_999_999);

/// Minimum age at the time of submission.
pub const MIN_APPLICANT_AGE: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Personal,
    Family,
    Physical,
    Address,
    Additional,
    PreviousEducation,
    Parents,
    Guardian,
    SocialSupport,
    Registration,
}

impl Section {
    pub const fn label(self) -> &'static str {
        match self {
            Section::Personal => "Informasi Pribadi",
            Section::Family => "Informasi Keluarga",
            Section::Physical => "Informasi Fisik",
            Section::Address => "Informasi Alamat",
            Section::Additional => "Informasi Tambahan",
            Section::PreviousEducation => "Pendidikan Sebelumnya",
            Section::Parents => "Informasi Orang Tua",
            Section::Guardian => "Informasi Wali",
            Section::SocialSupport => "Bantuan Sosial",
            Section::Registration => "Informasi Pendaftaran",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    LongText,
    Digits,
    Email,
    Phone,
    Date,
    Year,
    Integer,
    Amount,
    Choice {
        options: &'static [(&'static str, &'static str)],
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", content = "value", rename_all = "snake_case")]
pub enum Rule {
    Required,
    MaxLength(usize),
    ExactDigits(usize),
    Min(i64),
    Max(i64),
    MaxAmount(Money),
    NonNegative,
    Email,
    Phone,
    BornAtLeastYearsAgo(u32),
    /// Enforced by the store among non-deleted registrations.
    Unique,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub label: &'static str,
    pub section: Section,
    pub section_label: &'static str,
    pub kind: FieldKind,
    pub rules: &'static [Rule],
}

const fn field(
    name: &'static str,
    label: &'static str,
    section: Section,
    kind: FieldKind,
    rules: &'static [Rule],
) -> FieldDescriptor {
    FieldDescriptor {
        name,
        label,
        section,
        section_label: section.label(),
        kind,
        rules,
    }
}

const REQUIRED_TEXT: &[Rule] = &[Rule::Required, Rule::MaxLength(255)];
const OPTIONAL_TEXT: &[Rule] = &[Rule::MaxLength(255)];
const REQUIRED: &[Rule] = &[Rule::Required];
const NIK: &[Rule] = &[Rule::Required, Rule::ExactDigits(16)];
const PHONE: &[Rule] = &[Rule::Required, Rule::Phone, Rule::MaxLength(15)];
const INCOME: &[Rule] = &[Rule::Required, Rule::NonNegative, Rule::MaxAmount(MAX_INCOME)];

use FieldKind::*;
use Section::*;

/// Every submitted field of a registration, in form order.
pub static REGISTRATION_FIELDS: &[FieldDescriptor] = &[
    field("nik", "NIK", Personal, Digits, &[Rule::Required, Rule::ExactDigits(16), Rule::Unique]),
    field("family_card_number", "Nomor Kartu Keluarga", Personal, Digits, NIK),
    field("nisn", "NISN", Personal, Digits, &[Rule::Required, Rule::ExactDigits(10), Rule::Unique]),
    field("full_name", "Nama Lengkap", Personal, Text, REQUIRED_TEXT),
    field("gender", "Jenis Kelamin", Personal, Choice { options: Gender::OPTIONS }, REQUIRED),
    field("birth_place", "Tempat Lahir", Personal, Text, REQUIRED_TEXT),
    field(
        "birth_date",
        "Tanggal Lahir",
        Personal,
        Date,
        &[Rule::Required, Rule::BornAtLeastYearsAgo(MIN_APPLICANT_AGE)],
    ),
    field("religion", "Agama", Personal, Choice { options: Religion::OPTIONS }, REQUIRED),
    field("child_order", "Anak ke-", Family, Integer, &[Rule::Required, Rule::Min(1)]),
    field("siblings_count", "Jumlah Saudara", Family, Integer, &[Rule::Required, Rule::Min(0)]),
    field("child_status", "Status Anak", Family, Choice { options: ChildStatus::OPTIONS }, REQUIRED),
    field("height", "Tinggi Badan", Physical, Integer, &[Rule::Required, Rule::Min(100), Rule::Max(250)]),
    field("weight", "Berat Badan", Physical, Integer, &[Rule::Required, Rule::Min(25), Rule::Max(200)]),
    field("blood_type", "Golongan Darah", Physical, Choice { options: BloodType::OPTIONS }, &[]),
    field("address", "Alamat", Address, LongText, REQUIRED),
    field("village", "Desa/Kelurahan", Address, Text, REQUIRED_TEXT),
    field("district", "Kecamatan", Address, Text, REQUIRED_TEXT),
    field("city", "Kota/Kabupaten", Address, Text, REQUIRED_TEXT),
    field("province", "Provinsi", Address, Text, REQUIRED_TEXT),
    field("postal_code", "Kode Pos", Address, Digits, &[Rule::Required, Rule::ExactDigits(5)]),
    field("email", "Email", Address, Email, &[Rule::Required, Rule::Email, Rule::MaxLength(255), Rule::Unique]),
    field("uniform_size", "Ukuran Seragam", Additional, Choice { options: UniformSize::OPTIONS }, REQUIRED),
    field(
        "residence_status",
        "Status Tempat Tinggal",
        Additional,
        Choice { options: ResidenceStatus::OPTIONS },
        REQUIRED,
    ),
    field(
        "transportation",
        "Transportasi",
        Additional,
        Choice { options: Transportation::OPTIONS },
        REQUIRED,
    ),
    field(
        "previous_school_type",
        "Jenis Sekolah Sebelumnya",
        PreviousEducation,
        Choice { options: PreviousSchoolType::OPTIONS },
        REQUIRED,
    ),
    field("previous_school_address", "Alamat Sekolah Sebelumnya", PreviousEducation, LongText, REQUIRED),
    field("diploma_number", "Nomor Ijazah", PreviousEducation, Text, OPTIONAL_TEXT),
    field("diploma_date", "Tanggal Ijazah", PreviousEducation, Date, &[]),
    field("graduation_year", "Tahun Lulus", PreviousEducation, Year, &[Rule::Required, Rule::Min(1000), Rule::Max(9999)]),
    field("student_phone", "Nomor Telepon Siswa", PreviousEducation, Phone, PHONE),
    field("father_name", "Nama Ayah", Parents, Text, REQUIRED_TEXT),
    field("father_nik", "NIK Ayah", Parents, Digits, NIK),
    field("father_occupation", "Pekerjaan Ayah", Parents, Text, REQUIRED_TEXT),
    field("father_income", "Penghasilan Ayah", Parents, Amount, INCOME),
    field("mother_name", "Nama Ibu", Parents, Text, REQUIRED_TEXT),
    field("mother_nik", "NIK Ibu", Parents, Digits, NIK),
    field("mother_occupation", "Pekerjaan Ibu", Parents, Text, REQUIRED_TEXT),
    field("mother_income", "Penghasilan Ibu", Parents, Amount, INCOME),
    field("parents_address", "Alamat Orang Tua", Parents, LongText, REQUIRED),
    field("parents_phone", "Nomor Telepon Orang Tua", Parents, Phone, PHONE),
    field("guardian_name", "Nama Wali", Guardian, Text, OPTIONAL_TEXT),
    field("guardian_occupation", "Pekerjaan Wali", Guardian, Text, OPTIONAL_TEXT),
    field("guardian_income", "Penghasilan Wali", Guardian, Amount, &[Rule::NonNegative, Rule::MaxAmount(MAX_INCOME)]),
    field("guardian_address", "Alamat Wali", Guardian, LongText, &[]),
    field("guardian_phone", "Nomor Telepon Wali", Guardian, Phone, &[Rule::Phone, Rule::MaxLength(15)]),
    field("kks_number", "Nomor KKS", SocialSupport, Text, OPTIONAL_TEXT),
    field("kip_number", "Nomor KIP", SocialSupport, Text, OPTIONAL_TEXT),
    field(
        "reference_source",
        "Sumber Referensi",
        Registration,
        Choice { options: ReferenceSource::OPTIONS },
        REQUIRED,
    ),
    field("selected_major", "Jurusan Pilihan", Registration, Text, REQUIRED_TEXT),
];

pub fn find(name: &str) -> Option<&'static FieldDescriptor> {
    REGISTRATION_FIELDS.iter().find(|descriptor| descriptor.name == name)
}
