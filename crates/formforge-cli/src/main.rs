use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use formforge_api::{
    CreateFormRequest, CreateUserRequest, FormsApi, Requester, SubmitFormRequest,
    UpdateFormRequest,
};
use formforge_core::{AnswerInput, FormInput, UserRole};
use serde::de::DeserializeOwned;
use serde_json::Value;

const CLI_CONTRACT_VERSION: &str = "cli.v1";

#[derive(Debug, Parser)]
#[command(name = "ff")]
#[command(about = "FormForge CLI")]
struct Cli {
    #[arg(long, default_value = "./formforge.sqlite3")]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Db {
        #[command(subcommand)]
        command: DbCommand,
    },
    Form {
        #[command(subcommand)]
        command: Box<FormCommand>,
    },
    User {
        #[command(subcommand)]
        command: UserCommand,
    },
    Submission {
        #[command(subcommand)]
        command: Box<SubmissionCommand>,
    },
    File {
        #[command(subcommand)]
        command: FileCommand,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    SchemaVersion,
}

#[derive(Debug, Subcommand)]
enum FormCommand {
    Create(FormCreateArgs),
    List,
    Show(FormShowArgs),
    Update(FormUpdateArgs),
    Publish(FormPublishArgs),
    Delete(FormShowArgs),
    Submissions(FormShowArgs),
    Files(FormShowArgs),
}

#[derive(Debug, Args)]
struct FormCreateArgs {
    #[arg(long)]
    created_by: String,
    /// Path to a JSON authoring payload (title, config, questions).
    #[arg(long)]
    input: PathBuf,
}

#[derive(Debug, Args)]
struct FormShowArgs {
    #[arg(long)]
    form_id: String,
}

#[derive(Debug, Args)]
struct FormUpdateArgs {
    #[arg(long)]
    form_id: String,
    #[arg(long)]
    editor: String,
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,
    #[arg(long)]
    input: PathBuf,
}

#[derive(Debug, Args)]
struct FormPublishArgs {
    #[arg(long)]
    form_id: String,
    #[arg(long)]
    published_by: String,
}

#[derive(Debug, Subcommand)]
enum UserCommand {
    Create(UserCreateArgs),
}

#[derive(Debug, Args)]
struct UserCreateArgs {
    #[arg(long)]
    username: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    password_hash: String,
    #[arg(long, value_enum)]
    role: RoleArg,
}

#[derive(Debug, Subcommand)]
enum SubmissionCommand {
    Submit(SubmissionSubmitArgs),
    Mine(SubmissionMineArgs),
    Show(SubmissionShowArgs),
    Files(SubmissionShowArgs),
}

#[derive(Debug, Args)]
struct SubmissionSubmitArgs {
    #[arg(long)]
    form_id: String,
    #[arg(long)]
    user_id: i64,
    /// Path to a JSON array of answers.
    #[arg(long)]
    input: PathBuf,
}

#[derive(Debug, Args)]
struct SubmissionMineArgs {
    #[arg(long)]
    user_id: i64,
}

#[derive(Debug, Args)]
struct SubmissionShowArgs {
    #[arg(long)]
    submission_id: i64,
    #[arg(long)]
    user_id: Option<i64>,
    #[arg(long, default_value_t = false)]
    admin: bool,
}

#[derive(Debug, Subcommand)]
enum FileCommand {
    Download(FileDownloadArgs),
}

#[derive(Debug, Args)]
struct FileDownloadArgs {
    #[arg(long)]
    file_id: i64,
    #[arg(long)]
    user_id: Option<i64>,
    #[arg(long, default_value_t = false)]
    admin: bool,
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RoleArg {
    Learner,
    Admin,
}

impl RoleArg {
    fn into_role(self) -> UserRole {
        match self {
            Self::Learner => UserRole::Learner,
            Self::Admin => UserRole::Admin,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Draft,
    Publish,
}

impl ModeArg {
    fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Publish => "publish",
        }
    }
}

fn with_contract_version(value: Value) -> Value {
    match value {
        Value::Object(mut object) => {
            object.insert(
                "contract_version".to_string(),
                Value::String(CLI_CONTRACT_VERSION.to_string()),
            );
            Value::Object(object)
        }
        other => serde_json::json!({
            "contract_version": CLI_CONTRACT_VERSION,
            "payload": other
        }),
    }
}

fn emit_json(value: Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&with_contract_version(value))?);
    Ok(())
}

fn emit<T: serde::Serialize>(value: &T) -> Result<()> {
    emit_json(serde_json::to_value(value)?)
}

fn read_json_input<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read input file {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse JSON input {}", path.display()))
}

fn requester(user_id: Option<i64>, admin: bool) -> Requester {
    Requester { user_id, is_admin: admin }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let api = FormsApi::new(cli.db);
    match cli.command {
        Command::Db { command } => run_db(command, &api),
        Command::Form { command } => run_form(*command, &api),
        Command::User { command } => run_user(command, &api),
        Command::Submission { command } => run_submission(*command, &api),
        Command::File { command } => run_file(command, &api),
    }
}

fn run_db(command: DbCommand, api: &FormsApi) -> Result<()> {
    match command {
        DbCommand::SchemaVersion => emit(&api.schema_status()?),
    }
}

fn run_form(command: FormCommand, api: &FormsApi) -> Result<()> {
    match command {
        FormCommand::Create(args) => {
            let form: FormInput = read_json_input(&args.input)?;
            emit(&api.create_form(CreateFormRequest { created_by: args.created_by, form })?)
        }
        FormCommand::List => emit(&api.list_forms()?),
        FormCommand::Show(args) => emit(&api.get_form(&args.form_id)?),
        FormCommand::Update(args) => {
            let form: FormInput = read_json_input(&args.input)?;
            emit(&api.update_form(
                &args.form_id,
                UpdateFormRequest {
                    mode: args.mode.map(|mode| mode.as_str().to_string()),
                    editor: args.editor,
                    form,
                },
            )?)
        }
        FormCommand::Publish(args) => {
            emit(&api.publish_form(&args.form_id, &args.published_by)?)
        }
        FormCommand::Delete(args) => emit(&api.delete_form(&args.form_id)?),
        FormCommand::Submissions(args) => emit(&api.form_submissions(&args.form_id)?),
        FormCommand::Files(args) => emit(&api.form_files(&args.form_id)?),
    }
}

fn run_user(command: UserCommand, api: &FormsApi) -> Result<()> {
    match command {
        UserCommand::Create(args) => emit(&api.create_user(CreateUserRequest {
            username: args.username,
            email: args.email,
            password_hash: args.password_hash,
            role: args.role.into_role(),
        })?),
    }
}

fn run_submission(command: SubmissionCommand, api: &FormsApi) -> Result<()> {
    match command {
        SubmissionCommand::Submit(args) => {
            let answers: Vec<AnswerInput> = read_json_input(&args.input)?;
            emit(&api.submit_form(SubmitFormRequest {
                form_id: args.form_id,
                user_id: args.user_id,
                answers,
            })?)
        }
        SubmissionCommand::Mine(args) => emit(&api.my_submissions(args.user_id)?),
        SubmissionCommand::Show(args) => emit(
            &api.submission_details(args.submission_id, requester(args.user_id, args.admin))?,
        ),
        SubmissionCommand::Files(args) => emit(
            &api.submission_files(args.submission_id, requester(args.user_id, args.admin))?,
        ),
    }
}

fn run_file(command: FileCommand, api: &FormsApi) -> Result<()> {
    match command {
        FileCommand::Download(args) => {
            let download =
                api.file_download(args.file_id, requester(args.user_id, args.admin))?;
            fs::write(&args.out, &download.file_bytes)
                .with_context(|| format!("failed to write {}", args.out.display()))?;
            emit_json(serde_json::json!({
                "file_id": args.file_id,
                "file_name": download.file_name,
                "mime_type": download.mime_type,
                "bytes_written": download.file_bytes.len(),
                "out": args.out.display().to_string(),
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test IDs: TCLI-001
    #[test]
    fn contract_version_is_injected_into_object_output() {
        let wrapped = with_contract_version(serde_json::json!({ "status": "ok" }));
        assert_eq!(
            wrapped.get("contract_version").and_then(Value::as_str),
            Some(CLI_CONTRACT_VERSION)
        );
        assert_eq!(wrapped.get("status").and_then(Value::as_str), Some("ok"));
    }

    // Test IDs: TCLI-002
    #[test]
    fn contract_version_wraps_non_object_output() {
        let wrapped = with_contract_version(serde_json::json!([1, 2, 3]));
        assert_eq!(
            wrapped.get("contract_version").and_then(Value::as_str),
            Some(CLI_CONTRACT_VERSION)
        );
        assert!(wrapped.get("payload").is_some_and(Value::is_array));
    }

    // Test IDs: TCLI-003
    #[test]
    fn cli_parses_nested_subcommands() {
        let cli = match Cli::try_parse_from([
            "ff",
            "--db",
            "test.sqlite3",
            "submission",
            "show",
            "--submission-id",
            "7",
            "--user-id",
            "3",
        ]) {
            Ok(cli) => cli,
            Err(err) => panic!("failed to parse CLI args: {err}"),
        };
        match cli.command {
            Command::Submission { command } => match *command {
                SubmissionCommand::Show(args) => {
                    assert_eq!(args.submission_id, 7);
                    assert_eq!(args.user_id, Some(3));
                    assert!(!args.admin);
                }
                other => panic!("unexpected submission command: {other:?}"),
            },
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
