use crate::infra::Stores;
use chrono::{Datelike, Duration, NaiveDate, TimeZone, Utc};
use clap::Args;
use ppdb::admissions::{
    AdmissionsState, AdmissionsSummary, ChildStatus, FeeCatalogRepository, FeeDraft, FixedClock,
    Gender, Money, PreviousSchoolType, ReferenceSource, RegistrantDetails,
    RegistrationQuery, RegistrationRepository, RegistrationStatus, Religion, ResidenceStatus,
    ServiceError, Transportation, UniformSize,
};
use ppdb::config::{StorageBackend, StorageConfig};
use ppdb::error::AppError;
use std::sync::Arc;

const DEMO_FEES: [(&str, i64); 3] = [
    ("Formulir Pendaftaran", 150_000),
    ("Seragam", 850_000),
    ("Buku Paket", 400_000),
];

const DEMO_APPLICANTS: [(&str, Gender, &str); 3] = [
    ("Siti Rahmawati", Gender::Female, "IPA"),
    ("Budi Santoso", Gender::Male, "IPS"),
    ("Dewi Lestari", Gender::Female, "IPA"),
];

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Date the walkthrough runs on (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// SQLite database path to seed instead of the in-memory store.
    #[arg(long)]
    pub(crate) database: Option<String>,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let today = args.today.unwrap_or_else(|| Utc::now().date_naive());
    let opening = Utc
        .with_ymd_and_hms(today.year(), today.month(), today.day(), 8, 0, 0)
        .single()
        .unwrap_or_else(Utc::now);
    let clock = Arc::new(FixedClock::new(opening));

    let backend = args
        .database
        .as_deref()
        .map(StorageBackend::from_setting)
        .unwrap_or(StorageBackend::Memory);
    let config = StorageConfig {
        backend,
        page_size: 10,
    };

    println!("PPDB admissions walkthrough for {today}");
    match Stores::open(&config, clock.clone())? {
        Stores::Memory(state) => walkthrough(&state, &clock, today),
        Stores::Sqlite(state) => walkthrough(&state, &clock, today),
    }
}

fn walkthrough<R, F>(
    state: &AdmissionsState<R, F>,
    clock: &FixedClock,
    today: NaiveDate,
) -> Result<(), AppError>
where
    R: RegistrationRepository + 'static,
    F: FeeCatalogRepository + 'static,
{
    let year = today.year();
    if state.fees.get_year(year).is_err() {
        state.fees.create_year(year).map_err(report_failure)?;
        for (name, amount) in DEMO_FEES {
            state
                .fees
                .add_fee(
                    year,
                    FeeDraft {
                        name: name.to_string(),
                        amount,
                    },
                )
                .map_err(report_failure)?;
        }
    }
    let catalog = state.fees.get_year(year).map_err(report_failure)?.view();
    println!("\nFee catalog {}", catalog.year);
    for fee in &catalog.fees {
        println!("  - {:<24} Rp {:>12}", fee.name, fee.amount);
    }
    println!("  = {:<24} Rp {:>12}", "Total", catalog.total_amount);

    let mut submitted = Vec::new();
    for (offset, (name, gender, major)) in DEMO_APPLICANTS.into_iter().enumerate() {
        let seed = seed_for(today, offset);
        match state
            .registrations
            .submit(sample_applicant(seed, name, gender, major, today))
        {
            Ok(record) => {
                println!(
                    "Submitted {} for {} ({})",
                    record.registration_number, record.details.full_name, major
                );
                submitted.push(record.id);
            }
            Err(err) => println!("Skipped {name}: {err}"),
        }
        clock.advance(Duration::minutes(45));
    }

    if let Some(first) = submitted.first() {
        let report = state
            .registrations
            .bulk_set_status(&[*first], RegistrationStatus::Approved);
        for transition in &report.succeeded {
            println!(
                "Registration {} moved {} -> {}",
                transition.id,
                transition.from.label(),
                transition.to.label()
            );
        }
    }

    let listing = state
        .registrations
        .list_views(&RegistrationQuery::default())
        .map_err(report_failure)?;
    println!(
        "\nRegistrations (page {}/{} of {} total)",
        listing.page, listing.last_page, listing.total
    );
    for view in &listing.items {
        println!(
            "  {} | {:<20} | {:<4} | age {:>2} | {:<9} | parents Rp {}",
            view.record.registration_number,
            view.display_name,
            view.record.details.selected_major,
            view.age,
            view.status_label,
            view.total_parent_income
        );
    }

    let summary = AdmissionsSummary::collect(&state.registrations, &state.fees, year, None)
        .map_err(report_failure)?;
    println!("\nDashboard");
    if let Some(pending) = summary.pending_badge {
        println!("  {pending} registration(s) awaiting review");
    }
    for entry in &summary.statuses {
        println!("  {:<10} {}", entry.status_label, entry.registrations);
    }
    for major in &summary.majors {
        println!("  major {:<6} {}", major.major, major.registrations);
    }
    println!(
        "  average parent income Rp {}",
        summary.income.average_parent_income
    );

    Ok(())
}

fn report_failure(err: ServiceError) -> AppError {
    match err {
        ServiceError::Repository(source) => AppError::Storage(source),
        other => AppError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            other.to_string(),
        )),
    }
}

/// Keeps identity numbers distinct when the demo is run repeatedly on one database.
fn seed_for(today: NaiveDate, offset: usize) -> u32 {
    today.ordinal() * 10 + offset as u32 + 1
}

fn sample_applicant(
    seed: u32,
    full_name: &str,
    gender: Gender,
    major: &str,
    today: NaiveDate,
) -> RegistrantDetails {
    RegistrantDetails {
        nik: format!("32730100000{seed:05}"),
        family_card_number: format!("32730200000{seed:05}"),
        nisn: format!("{seed:010}"),
        full_name: full_name.to_string(),
        gender,
        birth_place: "Bandung".to_string(),
        birth_date: today - Duration::days(15 * 365 + 120),
        religion: Religion::Islam,
        child_order: 1,
        siblings_count: 2,
        child_status: ChildStatus::Biological,
        height: 155,
        weight: 45,
        blood_type: None,
        address: "Jl. Merdeka No. 10".to_string(),
        village: "Sukajadi".to_string(),
        district: "Sukasari".to_string(),
        city: "Bandung".to_string(),
        province: "Jawa Barat".to_string(),
        postal_code: "40111".to_string(),
        email: format!("pendaftar{seed}@example.com"),
        uniform_size: UniformSize::M,
        residence_status: ResidenceStatus::Owned,
        transportation: Transportation::Motorcycle,
        previous_school_type: PreviousSchoolType::Smpn,
        previous_school_address: "Jl. Pendidikan No. 1".to_string(),
        diploma_number: None,
        diploma_date: None,
        graduation_year: u16::try_from(today.year() - 1).unwrap_or(2024),
        student_phone: "081234567890".to_string(),
        father_name: "Ahmad".to_string(),
        father_nik: format!("32730300000{seed:05}"),
        father_occupation: "Wiraswasta".to_string(),
        father_income: Money::from_units(5_000_000),
        mother_name: "Aminah".to_string(),
        mother_nik: format!("32730400000{seed:05}"),
        mother_occupation: "Guru".to_string(),
        mother_income: Money::from_units(3_000_000),
        parents_address: "Jl. Merdeka No. 10".to_string(),
        parents_phone: "081298765432".to_string(),
        guardian_name: None,
        guardian_occupation: None,
        guardian_income: None,
        guardian_address: None,
        guardian_phone: None,
        kks_number: None,
        kip_number: None,
        reference_source: ReferenceSource::Friend,
        selected_major: major.to_string(),
    }
}
