use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use mythipet::config::{save_settings_atomic, Paths, Settings};
use mythipet::session::{Outcome, SessionController, SessionSnapshot};
use mythipet::storage::SaveStore;

use crate::input::{parse_command, Command, HELP};

/// Notifications raised by the session from its timer tasks.
#[derive(Clone, Copy, Debug)]
enum SessionEvent {
    GameOver,
    Busy(bool),
}

pub(crate) struct App {
    controller: SessionController,
    /// Slot created by `new` and waiting for `choose`.
    pending_save: Option<u32>,
    should_quit: bool,
}

impl App {
    fn init(paths: &Paths, settings: Settings) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        if !paths.settings_path.exists() {
            if let Err(e) = save_settings_atomic(&paths.settings_path, &settings) {
                warn!(error = %e, "could not write default settings");
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let mut controller = SessionController::new(SaveStore::new(paths.save_path.clone()), settings);
        let game_over_tx = tx.clone();
        controller.on_game_over(move || {
            let _ = game_over_tx.send(SessionEvent::GameOver);
        });
        controller.on_busy_changed(move |busy| {
            let _ = tx.send(SessionEvent::Busy(busy));
        });
        info!(save_file = %paths.save_path.display(), "ready");

        (
            Self {
                controller,
                pending_save: None,
                should_quit: false,
            },
            rx,
        )
    }

    async fn run(&mut self, mut events: mpsc::UnboundedReceiver<SessionEvent>) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        println!("{HELP}");

        while !self.should_quit {
            tokio::select! {
                line = lines.next_line() => match line? {
                    Some(line) => self.handle_line(&line),
                    None => break,
                },
                Some(event) = events.recv() => self.handle_event(event),
            }
        }

        self.leave_session();
        Ok(())
    }

    fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::GameOver => {
                let name = self
                    .controller
                    .pet_snapshot()
                    .map(|p| p.name().to_string())
                    .unwrap_or_default();
                println!("{name} has nothing left. Game over. Type `home`, `load <id>` or `new <username>`.");
            }
            SessionEvent::Busy(true) => println!("..."),
            SessionEvent::Busy(false) => println!("ready."),
        }
    }

    fn handle_line(&mut self, line: &str) {
        let cmd = match parse_command(line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => return,
            Err(e) => {
                println!("{e}");
                return;
            }
        };
        if let Err(e) = self.apply(cmd) {
            println!("error: {e}");
        }
    }

    fn apply(&mut self, cmd: Command) -> Result<()> {
        match cmd {
            Command::New(username) => {
                let id = self.controller.create_save(&username)?;
                self.pending_save = Some(id);
                println!("save {id} created for {username}. Now `choose <name> <phoenix|pegasus|dragon>`.");
            }
            Command::Choose { name, variant } => {
                let Some(id) = self.pending_save.or(self.controller.active_save_id()) else {
                    println!("start with `new <username>` first.");
                    return Ok(());
                };
                let snapshot = self.controller.choose_pet(id, &name, variant)?;
                self.pending_save = None;
                print_snapshot(&snapshot);
            }
            Command::Load(id) => {
                let snapshot = self.controller.load_save(id)?;
                self.pending_save = None;
                print_snapshot(&snapshot);
            }
            Command::List => {
                let saves = self.controller.list_saves()?;
                if saves.is_empty() {
                    println!("no saves yet.");
                }
                for s in saves {
                    println!(
                        "[{}] {} with {} the {} (level {}, last played {})",
                        s.save_id,
                        s.username,
                        s.pet_name,
                        s.pet_type,
                        s.level,
                        s.last_played.as_deref().unwrap_or("never"),
                    );
                }
            }
            Command::Save => {
                let Some(id) = self.controller.active_save_id() else {
                    println!("nothing to save.");
                    return Ok(());
                };
                self.controller.save_game(id)?;
                println!("saved.");
            }
            Command::Direct(action) => {
                let outcome = self.controller.direct(action)?;
                print_outcome(&outcome);
            }
            Command::Pet(action) => {
                let reaction = self.controller.pet_action(action)?;
                if let Some(pet) = self.controller.pet_snapshot() {
                    println!("{}", reaction.describe(&pet));
                }
            }
            Command::Use { category, index } => {
                let outcome = self.controller.use_item(category, index)?;
                print_outcome(&outcome);
            }
            Command::Stats => match self.controller.snapshot() {
                Some(s) => print_snapshot(&s),
                None => println!("no game loaded."),
            },
            Command::Inventory => match self.controller.snapshot() {
                Some(s) => {
                    for item in s.inventory.items() {
                        println!("  {item}");
                    }
                }
                None => println!("no game loaded."),
            },
            Command::Home => {
                self.leave_session();
                println!("back home. `list`, `load <id>` or `new <username>`.");
            }
            Command::Help => println!("{HELP}"),
            Command::Quit => self.should_quit = true,
        }
        Ok(())
    }

    /// Saves a live session and tears it down.
    fn leave_session(&mut self) {
        if let Some(id) = self.controller.active_save_id() {
            if !self.controller.is_game_over() {
                if let Err(e) = self.controller.save_game(id) {
                    println!("error: {e}");
                }
            }
        }
        self.controller.end_session();
    }
}

fn print_snapshot(s: &SessionSnapshot) {
    let stats = s.pet.stats();
    println!(
        "{} the {} (save {}, {}), level {}",
        s.pet.name(),
        s.pet.variant(),
        s.save_id,
        s.username,
        s.level
    );
    println!(
        "  hunger {}  fun {}  sleep {}  grooming {}",
        stats.hunger, stats.fun, stats.sleep, stats.grooming
    );
}

fn print_outcome(o: &Outcome) {
    let s = &o.stats;
    match o.remaining {
        Some(left) => println!(
            "level {}  hunger {} fun {} sleep {} grooming {}  ({left} left)",
            o.level, s.hunger, s.fun, s.sleep, s.grooming
        ),
        None => println!(
            "level {}  hunger {} fun {} sleep {} grooming {}",
            o.level, s.hunger, s.fun, s.sleep, s.grooming
        ),
    }
}

pub(crate) async fn run(paths: Paths, settings: Settings) -> Result<()> {
    let (mut app, events) = App::init(&paths, settings);
    app.run(events).await
}
