use crate::infra::{in_memory_collaborators, InMemoryBackends, InMemorySessionRepository};
use chrono::{DateTime, Utc};
use clap::Args;
use profile_builder::config::StorageConfig;
use profile_builder::error::AppError;
use profile_builder::workflows::profiles::{
    candidate_profile, employer_profile, employer_signup, WizardCatalog,
};
use profile_builder::workflows::sessions::{SessionId, WizardSessionService};
use profile_builder::workflows::submission::{SagaOutcome, SagaResult};
use profile_builder::workflows::wizard::{FileHandle, WizardKind};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

const SAMPLE_CV: &str = "Name: Tan Mei Ling\n\
Email: meiling.tan@example.com\n\
Phone: +65 9123 4567\n\
Experience: Guest Relations Executive at Harbourfront Hotel\n\
Education: Temasek Polytechnic - Diploma in Hospitality\n\
Certificate: WSQ Food Hygiene\n";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// CV to feed the candidate wizard's extraction step. Defaults to a built-in text CV.
    #[arg(long)]
    pub(crate) cv: Option<PathBuf>,
    /// Print the outcomes as JSON instead of text.
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct DemoRun {
    pub(crate) scenario: &'static str,
    pub(crate) wizard: WizardKind,
    pub(crate) session_id: SessionId,
    #[serde(flatten)]
    pub(crate) result: SagaResult,
}

#[derive(Debug, Serialize)]
pub(crate) struct DemoSummary {
    pub(crate) generated_at: DateTime<Utc>,
    pub(crate) runs: Vec<DemoRun>,
    pub(crate) persisted_profiles: usize,
    pub(crate) stored_artifacts: usize,
}

type DemoService = WizardSessionService<InMemorySessionRepository>;

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let cv = match &args.cv {
        Some(path) => {
            let bytes = std::fs::read(path)?;
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "cv".to_string());
            FileHandle::new(name, mime.essence_str(), bytes)
        }
        None => FileHandle::new("sample-cv.txt", "text/plain", SAMPLE_CV.as_bytes().to_vec()),
    };

    let storage = StorageConfig {
        artifact_base_url: "memory://artifacts".to_string(),
        bucket_folders: BTreeMap::new(),
        drive_service_account_key: None,
    };
    let backends = in_memory_collaborators(&storage);
    let service = WizardSessionService::new(
        Arc::new(InMemorySessionRepository::default()),
        WizardCatalog::standard(),
        backends.collaborators.clone(),
    );

    let runs = vec![
        employer_signup_run(&service, "employer signup", "Harbourfront Hospitality Pte Ltd")?,
        employer_signup_run(&service, "duplicate registration", "Harbourfront Holdings Pte Ltd")?,
        employer_profile_run(&service)?,
        candidate_profile_run(&service, cv)?,
    ];

    let summary = summarize(runs, &backends);
    if args.json {
        match serde_json::to_string_pretty(&summary) {
            Ok(rendered) => println!("{rendered}"),
            Err(err) => return Err(std::io::Error::other(err).into()),
        }
    } else {
        render_summary(&summary);
    }
    Ok(())
}

fn summarize(runs: Vec<DemoRun>, backends: &InMemoryBackends) -> DemoSummary {
    DemoSummary {
        generated_at: Utc::now(),
        runs,
        persisted_profiles: backends.profiles.records().len(),
        stored_artifacts: backends.store.object_count(),
    }
}

fn employer_signup_run(
    service: &DemoService,
    scenario: &'static str,
    company_name: &str,
) -> Result<DemoRun, AppError> {
    let session = service.start(WizardKind::EmployerSignup)?;
    let id = session.id;

    service.update_section(
        &id,
        employer_signup::CONTACT,
        json!({ "contactName": "Aisyah Rahman", "email": "hr@harbourfront.example", "phone": "+65 6123 4567" }),
    )?;
    service.update_section(
        &id,
        employer_signup::COMPANY_INFO,
        json!({
            "companyName": company_name,
            "businessRegistrationNo": "201912345K",
            "industry": "hospitality"
        }),
    )?;

    let certificate = format!(
        "Certificate of Incorporation\nName: {company_name}\nUEN: 201912345K\n"
    );
    service.attach_file(
        &id,
        employer_signup::BR_CERTIFICATE,
        FileHandle::new("br-certificate.txt", "text/plain", certificate.into_bytes()),
    )?;

    submit_from_review(service, scenario, id)
}

fn employer_profile_run(service: &DemoService) -> Result<DemoRun, AppError> {
    let session = service.start(WizardKind::EmployerProfile)?;
    let id = session.id;

    service.update_section(
        &id,
        employer_profile::COMPANY_PROFILE,
        json!({
            "description": "Boutique waterfront hotel group running three properties with a focus on service training.",
            "industry": "hospitality",
            "website": "https://harbourfront.example",
            "headcount": 180
        }),
    )?;
    service.update_section(
        &id,
        employer_profile::HOSPITALITY_DETAILS,
        json!({ "venueType": "hotel", "starRating": 4 }),
    )?;
    service.update_section(
        &id,
        employer_profile::BENEFITS,
        json!([{ "name": "Staff meals" }, { "name": "Annual wage supplement" }]),
    )?;
    service.attach_file(
        &id,
        employer_profile::COMPANY_LOGO,
        FileHandle::new("logo.png", "image/png", vec![0x89, b'P', b'N', b'G']),
    )?;

    submit_from_review(service, "employer profile", id)
}

fn candidate_profile_run(service: &DemoService, cv: FileHandle) -> Result<DemoRun, AppError> {
    let session = service.start(WizardKind::CandidateProfile)?;
    let id = session.id;

    let session = service.attach_file(&id, candidate_profile::CV, cv)?;
    let form = session.state.form();

    let mut basics = serde_json::Map::new();
    basics.insert("candidateType".to_string(), json!("graduate"));
    if form.text(candidate_profile::BASIC_INFO, "fullName").is_none() {
        basics.insert("fullName".to_string(), json!("Tan Mei Ling"));
    }
    if form.text(candidate_profile::BASIC_INFO, "email").is_none() {
        basics.insert("email".to_string(), json!("meiling.tan@example.com"));
    }
    let needs_education = form.list(candidate_profile::EDUCATIONS).is_empty();
    service.update_section(&id, candidate_profile::BASIC_INFO, Value::Object(basics))?;

    if needs_education {
        service.update_section(
            &id,
            candidate_profile::EDUCATIONS,
            json!([{ "institution": "Temasek Polytechnic", "qualification": "Diploma in Hospitality" }]),
        )?;
    }
    service.update_section(
        &id,
        candidate_profile::PROJECTS,
        json!([{ "title": "Front desk service redesign" }]),
    )?;

    submit_from_review(service, "candidate profile", id)
}

/// Advance through the remaining steps and submit from the review screen.
fn submit_from_review(
    service: &DemoService,
    scenario: &'static str,
    id: SessionId,
) -> Result<DemoRun, AppError> {
    let mut session = service.get(&id)?;
    while !session.state.is_last_step() {
        session = service.next(&id)?;
    }

    let wizard = session.kind();
    let report = service.submit(&id)?;
    info!(scenario, outcome = report.result.outcome.label(), "demo wizard submitted");

    Ok(DemoRun {
        scenario,
        wizard,
        session_id: id,
        result: report.result,
    })
}

fn render_summary(summary: &DemoSummary) {
    println!("Profile wizard demo");
    println!("===================");
    println!("Generated at {}", summary.generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    for run in &summary.runs {
        println!();
        println!(
            "{} [{}] session {}",
            run.scenario,
            run.wizard.label(),
            run.session_id
        );
        println!("  outcome: {}", run.result.outcome.label());
        println!("  details: {}", describe_outcome(&run.result));
        for artifact in &run.result.uploaded {
            println!("  uploaded {} -> {}", artifact.section, artifact.url);
        }
        if !run.result.compensation.attempted.is_empty() {
            println!(
                "  compensated {} upload(s), {} failed",
                run.result.compensation.attempted.len(),
                run.result.compensation.failed.len()
            );
        }
    }
    println!();
    println!("Profiles persisted: {}", summary.persisted_profiles);
    println!("Artifacts still stored: {}", summary.stored_artifacts);
}

fn describe_outcome(result: &SagaResult) -> String {
    match &result.outcome {
        SagaOutcome::Success { record_id } => format!("persisted as {record_id}"),
        SagaOutcome::PreconditionFailed { reason, .. } => reason.clone(),
        SagaOutcome::UploadFailed {
            stage,
            section,
            reason,
        } => format!("upload {stage} ({section}) failed: {reason}"),
        SagaOutcome::ValidationFailed { step, field_errors } => {
            let fields: Vec<String> = field_errors
                .iter()
                .map(|(field, message)| format!("{field}: {message}"))
                .collect();
            match step {
                Some(step) => format!("back to {}: {}", step.0, fields.join("; ")),
                None => fields.join("; "),
            }
        }
        SagaOutcome::PersistenceFailed { reason } => reason.clone(),
        SagaOutcome::Aborted => "aborted before persisting".to_string(),
    }
}
