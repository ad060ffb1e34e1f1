//! `pettrack` - CLI for pettracker
//!
//! This binary drives the pet tracker shell from the command line: bind a
//! tag, edit the pet's records, record positions and listen for bridge
//! messages.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::Path;

use anyhow::{bail, Context};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use url::Url;

use pettracker::cli::{
    AuthCommand, Cli, Command, ConfigCommand, ContactCommand, EmergencyCommand, GeofenceCommand,
    LocationCommand, MedicalCommand, ReminderCommand, TagCommand,
};
use pettracker::identity::CallbackParams;
use pettracker::pages::contact::LostReport;
use pettracker::pages::home::EmergencyForm;
use pettracker::pages::location::{GeofenceDraft, LocationSource, LocationUpdate};
use pettracker::pages::medical::{Medication, MedicalEmergency, ReminderDraft};
use pettracker::pages::{ContactPage, HomePage, LocationPage, MedicalPage, PageContext, PageModule};
use pettracker::view::{Export, Render};
use pettracker::{init_logging, App, Config, HardwareEvent, Navigation, Route, TagId};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    if let Command::Config(config_cmd) = cli.command {
        return handle_config(&config, config_cmd);
    }

    let mut app = App::from_config(config)?;
    app.start(None).await?;

    let result = run(&mut app, cli.command).await;
    let flushed = app.shutdown();
    print_toasts(&mut app);
    result?;
    flushed?;
    Ok(())
}

async fn run(app: &mut App, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Tag(cmd) => handle_tag(app, cmd).await,
        Command::Status(cmd) => handle_status(app, cmd.json).await,
        Command::Navigate(cmd) => {
            let navigation = app.navigate_token(&cmd.route).await?;
            match navigation {
                Navigation::Mounted(_) => println!("{}", app.router().document().title()),
                Navigation::AuthRequired(route) => {
                    println!("{route} needs a connected tag. Run `pettrack tag set <id>` first.");
                }
            }
            Ok(())
        }
        Command::Contact(cmd) => handle_contact(app, cmd).await,
        Command::Location(cmd) => handle_location(app, cmd).await,
        Command::Geofence(cmd) => handle_geofence(app, cmd).await,
        Command::Medical(cmd) => handle_medical(app, cmd).await,
        Command::Reminder(cmd) => handle_reminder(app, cmd).await,
        Command::Emergency(cmd) => handle_emergency(app, &cmd).await,
        Command::Auth(cmd) => handle_auth(app, cmd).await,
        Command::Listen => {
            let stdin = BufReader::new(tokio::io::stdin());
            app.run(stdin).await?;
            Ok(())
        }
        Command::Config(_) => unreachable!("handled before the app starts"),
    }
}

fn print_toasts(app: &mut App) {
    for toast in app.take_toasts() {
        eprintln!("{toast}");
    }
}

async fn open(app: &mut App, route: Route) -> anyhow::Result<()> {
    match app.navigate(route).await? {
        Navigation::Mounted(_) => Ok(()),
        Navigation::AuthRequired(_) => {
            bail!("no pet tracker connected; run `pettrack tag set <id>` first")
        }
    }
}

fn home_page(app: &mut App) -> anyhow::Result<(&mut HomePage, PageContext<'_>)> {
    match app.active_page() {
        Some((PageModule::Home(page), ctx)) => Ok((page, ctx)),
        _ => bail!("home page is not open"),
    }
}

fn contact_page(app: &mut App) -> anyhow::Result<(&mut ContactPage, PageContext<'_>)> {
    match app.active_page() {
        Some((PageModule::Contact(page), ctx)) => Ok((page, ctx)),
        _ => bail!("contact page is not open"),
    }
}

fn location_page(app: &mut App) -> anyhow::Result<(&mut LocationPage, PageContext<'_>)> {
    match app.active_page() {
        Some((PageModule::Location(page), ctx)) => Ok((page, ctx)),
        _ => bail!("location page is not open"),
    }
}

fn medical_page(app: &mut App) -> anyhow::Result<(&mut MedicalPage, PageContext<'_>)> {
    match app.active_page() {
        Some((PageModule::Medical(page), ctx)) => Ok((page, ctx)),
        _ => bail!("medical page is not open"),
    }
}

fn write_export(export: &Export, output: Option<&Path>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, &export.contents)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => println!("{}", export.contents),
    }
    Ok(())
}

async fn handle_tag(app: &mut App, cmd: TagCommand) -> anyhow::Result<()> {
    match cmd {
        TagCommand::Set { tag_id } => {
            if app.manual_tag_entry(&tag_id).await?.is_none() {
                bail!("invalid tag id '{tag_id}'");
            }
        }
        TagCommand::Show => match app.tag() {
            Some(tag) => println!("{tag}"),
            None => println!("No pet tracker connected"),
        },
        TagCommand::Scan { serial } => {
            app.handle_event(HardwareEvent::NfcScan { serial }).await?;
        }
    }
    Ok(())
}

async fn handle_status(app: &mut App, json: bool) -> anyhow::Result<()> {
    open(app, Route::Home).await?;
    let (page, _) = home_page(app)?;
    let dashboard = page.view().map(Render::render).unwrap_or_default();

    if json {
        let user = app.user();
        let status = serde_json::json!({
            "tag_id": app.tag().map(TagId::as_str),
            "pet_name": user.map(|u| u.display_name()),
            "owner_name": user.map(|u| u.owner_name.as_str()),
            "last_seen": user
                .and_then(|u| u.location.last_known.as_ref())
                .map(|r| r.timestamp),
            "locations_recorded": user.map_or(0, |u| u.location.history.len()),
            "authenticated": app.identity().is_authenticated(),
            "database_path": app.config().database_path(),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("{dashboard}");
        println!();
        println!("Database:      {}", app.config().database_path().display());
    }
    Ok(())
}

async fn handle_contact(app: &mut App, cmd: ContactCommand) -> anyhow::Result<()> {
    open(app, Route::Contact).await?;
    let (page, mut ctx) = contact_page(app)?;
    match cmd {
        ContactCommand::Show => println!("{}", page.summary().render()),
        ContactCommand::Set { fields } => {
            for (name, value) in &fields {
                page.edit(name, value)?;
            }
            let patch = page.save(&mut ctx).await?;
            app.apply_patch(Some(patch))?;
        }
        ContactCommand::Card => {
            if let Some(card) = page.contact_card(&mut ctx) {
                println!("{card}");
            }
        }
        ContactCommand::Qr => {
            if let Some(text) = page.qr_text(&mut ctx) {
                println!("{text}");
            }
        }
        ContactCommand::Lost {
            last_seen,
            details,
            with_location,
        } => {
            let report = LostReport {
                last_seen,
                details,
                include_location: with_location,
            };
            page.report_lost(&mut ctx, &report).await?;
        }
    }
    Ok(())
}

async fn handle_location(app: &mut App, cmd: LocationCommand) -> anyhow::Result<()> {
    if let LocationCommand::Update {
        latitude,
        longitude,
        accuracy,
    } = cmd
    {
        let update = LocationUpdate {
            latitude,
            longitude,
            accuracy,
        };
        if app
            .report_location(update, LocationSource::Manual)
            .await?
            .is_none()
        {
            println!("Tracking is disabled for this tag.");
        }
        return Ok(());
    }

    open(app, Route::Location).await?;
    let (page, mut ctx) = location_page(app)?;
    match cmd {
        LocationCommand::Show => println!("{}", page.view(&ctx).render()),
        LocationCommand::Locate => {
            let patch = page.update_current_location(&mut ctx).await?;
            app.apply_patch(Some(patch))?;
        }
        LocationCommand::History { filter } => {
            for record in page.history(filter.into(), ctx.now) {
                println!(
                    "{}  {:.6}, {:.6}  {}  {}",
                    record.timestamp.to_rfc3339(),
                    record.latitude,
                    record.longitude,
                    record.accuracy_text(),
                    record
                        .source
                        .map_or_else(|| "unknown".to_string(), |s| s.to_string())
                );
            }
        }
        LocationCommand::Export { output } => {
            if let Some(export) = page.export_csv(&mut ctx) {
                write_export(&export, output.as_deref())?;
            }
        }
        LocationCommand::Share => {
            if let Some((title, text)) = page.share(&mut ctx) {
                println!("{title}\n{text}");
            }
        }
        LocationCommand::Update { .. } => unreachable!("handled above"),
    }
    Ok(())
}

async fn handle_geofence(app: &mut App, cmd: GeofenceCommand) -> anyhow::Result<()> {
    open(app, Route::Location).await?;
    let (page, mut ctx) = location_page(app)?;
    match cmd {
        GeofenceCommand::List => {
            if page.geofences().is_empty() {
                println!("No safe zones configured");
            }
            for zone in page.geofences() {
                println!(
                    "{}  {}  {}, {}  {}m  alert={}  {}  last={}",
                    zone.id,
                    zone.name,
                    zone.center_lat,
                    zone.center_lng,
                    zone.radius,
                    zone.alert_type,
                    if zone.is_active { "active" } else { "inactive" },
                    zone.last_status
                        .map_or_else(|| "-".to_string(), |s| s.to_string())
                );
            }
        }
        GeofenceCommand::Add {
            name,
            center,
            radius,
            alert,
        } => {
            let draft = GeofenceDraft {
                name,
                center,
                radius,
                alert_type: alert.into(),
            };
            let zone = page.add_geofence(&mut ctx, draft).await?;
            println!("{}", zone.id);
        }
        GeofenceCommand::Toggle { id } => {
            if page.toggle_geofence(&mut ctx, &id)?.is_none() {
                bail!("no safe zone with id '{id}'");
            }
        }
        GeofenceCommand::Delete { id } => {
            if !page.delete_geofence(&mut ctx, &id)? {
                bail!("no safe zone with id '{id}'");
            }
        }
    }
    Ok(())
}

async fn handle_medical(app: &mut App, cmd: MedicalCommand) -> anyhow::Result<()> {
    open(app, Route::Medical).await?;
    let (page, mut ctx) = medical_page(app)?;
    let patch = match cmd {
        MedicalCommand::Show => {
            println!("{}", page.summary().render());
            println!();
            println!("{}", page.vaccination_summary(ctx.now).render());
            None
        }
        MedicalCommand::Set { fields } => {
            for (name, value) in &fields {
                page.edit(name, value)?;
            }
            Some(page.save(&mut ctx).await?)
        }
        MedicalCommand::Vaccinate {
            vaccine,
            date,
            lapsed,
        } => {
            page.set_vaccination(vaccine.into(), Some(date), !lapsed);
            Some(page.save(&mut ctx).await?)
        }
        MedicalCommand::AddMedication {
            name,
            dosage,
            notes,
        } => {
            page.add_medication(Medication {
                name,
                dosage,
                notes,
            });
            Some(page.save(&mut ctx).await?)
        }
        MedicalCommand::Export { output } => {
            if let Some(export) = page.export_report(&mut ctx) {
                write_export(&export, output.as_deref())?;
            }
            None
        }
        MedicalCommand::Card => {
            if let Some(card) = page.medical_card(&mut ctx) {
                println!("{card}");
            }
            None
        }
        MedicalCommand::Vet => {
            if let Some(vet) = page.contact_vet(&mut ctx) {
                println!("{}", vet.render());
            }
            None
        }
        MedicalCommand::Emergency {
            kind,
            symptoms,
            location,
        } => {
            let emergency = MedicalEmergency {
                kind: kind.into(),
                symptoms,
                location,
            };
            for contact in page.report_emergency(&mut ctx, &emergency).await? {
                println!("{}: {}", contact.name, contact.phone);
            }
            None
        }
    };
    app.apply_patch(patch)?;
    Ok(())
}

async fn handle_reminder(app: &mut App, cmd: ReminderCommand) -> anyhow::Result<()> {
    open(app, Route::Medical).await?;
    let (page, mut ctx) = medical_page(app)?;
    match cmd {
        ReminderCommand::List => {
            let reminders = page.reminders(&mut ctx)?;
            if reminders.is_empty() {
                println!("No care reminders scheduled");
            }
            for reminder in reminders {
                println!(
                    "{}  {}  {}  {}",
                    reminder.date, reminder.kind, reminder.notes, reminder.id
                );
            }
        }
        ReminderCommand::Add { kind, date, notes } => {
            let reminder = page
                .schedule_reminder(&mut ctx, ReminderDraft { kind, date, notes })
                .await?;
            println!("{}", reminder.id);
        }
    }
    Ok(())
}

async fn handle_emergency(app: &mut App, cmd: &EmergencyCommand) -> anyhow::Result<()> {
    open(app, Route::Home).await?;
    let (page, mut ctx) = home_page(app)?;
    let form = EmergencyForm {
        kind: cmd.kind.into(),
        details: cmd.details.clone(),
        include_location: !cmd.no_location,
    };
    page.report_emergency(&mut ctx, &form).await?;
    Ok(())
}

async fn handle_auth(app: &mut App, cmd: AuthCommand) -> anyhow::Result<()> {
    match cmd {
        AuthCommand::Login => {
            let url = app.login_url()?;
            println!("Open this URL to sign in:\n\n  {url}\n");
            println!("Then paste the URL you were redirected to:");

            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            let Some(line) = lines.next_line().await? else {
                bail!("no redirect URL given");
            };
            let redirect = Url::parse(line.trim()).context("invalid redirect URL")?;
            if let Some(user) = app
                .handle_auth_callback(&CallbackParams::from_url(&redirect))
                .await?
            {
                println!(
                    "Signed in as {}",
                    user.full_name.as_deref().unwrap_or(&user.id)
                );
            }
        }
        AuthCommand::Logout => app.logout()?,
        AuthCommand::Status => {
            let identity = app.identity();
            match identity.user() {
                Some(user) if identity.is_authenticated() => {
                    println!(
                        "Signed in:     {}",
                        user.full_name.as_deref().unwrap_or(&user.id)
                    );
                    if let Some(email) = &user.email {
                        println!("Email:         {email}");
                    }
                    println!("Supporter:     {}", identity.is_supporter());
                    println!("Premium:       {}", identity.can_access_premium());
                }
                _ => println!("Not signed in"),
            }
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Notify]");
                println!(
                    "  Endpoint:           {}",
                    config.notify.endpoint.as_deref().unwrap_or("(log only)")
                );
                println!();
                println!("[Identity]");
                println!(
                    "  Client id:          {}",
                    config.identity.client_id.as_deref().unwrap_or("(not configured)")
                );
                println!("  Redirect URI:       {}", config.identity.redirect_uri);
                println!();
                println!("[Router]");
                match (&config.router.pages_base_url, &config.router.pages_dir) {
                    (Some(url), _) => println!("  Pages:              {url}"),
                    (None, Some(dir)) => println!("  Pages:              {}", dir.display()),
                    (None, None) => println!("  Pages:              (built in)"),
                }
                println!();
                println!("[Timers]");
                println!(
                    "  Contact auto-save:  {}s",
                    config.timers.contact_autosave_secs
                );
                println!(
                    "  Medical auto-save:  {}s",
                    config.timers.medical_autosave_secs
                );
                println!("  Refresh:            {}s", config.timers.refresh_secs);
                println!();
                println!("[Network]");
                println!("  Retry attempts:     {}", config.network.retry_attempts);
                println!(
                    "  Retry base delay:   {}ms",
                    config.network.retry_base_delay_ms
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)).and_then(|c| c.validate().map(|()| c)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
