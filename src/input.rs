use mythipet::inventory::ItemCategory;
use mythipet::model::Variant;
use mythipet::session::{DirectAction, PetAction};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Command {
    New(String),
    Choose { name: String, variant: Variant },
    Load(u32),
    List,
    Save,
    Direct(DirectAction),
    Pet(PetAction),
    Use { category: ItemCategory, index: u32 },
    Stats,
    Inventory,
    Home,
    Help,
    Quit,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub(crate) enum CommandError {
    #[error("unknown command: {0} (try `help`)")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error(transparent)]
    Variant(#[from] mythipet::error::ModelError),

    #[error(transparent)]
    Category(#[from] mythipet::error::InventoryError),
}

pub(crate) const HELP: &str = "\
new <username>               start a new save
choose <name> <type>         pick a phoenix, pegasus or dragon for the new save
load <id> | list | save      manage saves
f | p | g | b                feed, play, groom, rest
eat | play | sleep | bathe   let the pet do it its own way
use <category> <index>       use an item, e.g. `use food 1`
stats | inv | home | quit";

/// Parses one input line. Blank lines yield `None`.
pub(crate) fn parse_command(line: &str) -> Result<Option<Command>, CommandError> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();

    let cmd = match (head.to_ascii_lowercase().as_str(), rest.as_slice()) {
        ("new", []) => return Err(CommandError::Usage("new <username>")),
        ("new", name) => Command::New(name.join(" ")),
        ("choose", [name, variant]) => Command::Choose {
            name: name.to_string(),
            variant: variant.parse()?,
        },
        ("choose", _) => return Err(CommandError::Usage("choose <name> <phoenix|pegasus|dragon>")),
        ("load", [id]) => Command::Load(id.parse().map_err(|_| CommandError::Usage("load <id>"))?),
        ("load", _) => return Err(CommandError::Usage("load <id>")),
        ("list", []) => Command::List,
        ("save", []) => Command::Save,
        ("f", []) => Command::Direct(DirectAction::Feed),
        ("p", []) => Command::Direct(DirectAction::Play),
        ("g", []) => Command::Direct(DirectAction::Groom),
        ("b", []) => Command::Direct(DirectAction::Rest),
        ("eat", []) => Command::Pet(PetAction::Eat),
        ("play", []) => Command::Pet(PetAction::Play),
        ("sleep", []) => Command::Pet(PetAction::Sleep),
        ("bathe", []) => Command::Pet(PetAction::Groom),
        ("use", [category, index]) => {
            let category: ItemCategory = category.parse()?;
            let index = index
                .parse::<u32>()
                .ok()
                .filter(|i| (1..=category.slots()).contains(i))
                .ok_or(CommandError::Usage("use <category> <index within the category>"))?;
            Command::Use { category, index }
        }
        ("use", _) => return Err(CommandError::Usage("use <category> <index>")),
        ("stats", []) => Command::Stats,
        ("inv", []) => Command::Inventory,
        ("home", []) => Command::Home,
        ("help" | "h" | "?", []) => Command::Help,
        ("quit" | "q" | "exit", []) => Command::Quit,
        (other, _) => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(cmd))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_lines_are_ignored() {
        assert_eq!(parse_command("   "), Ok(None));
    }

    #[test]
    fn direct_keys_and_behaviours_are_distinct() {
        assert_eq!(
            parse_command("p").unwrap(),
            Some(Command::Direct(DirectAction::Play))
        );
        assert_eq!(
            parse_command("PLAY").unwrap(),
            Some(Command::Pet(PetAction::Play))
        );
        assert_eq!(
            parse_command("bathe").unwrap(),
            Some(Command::Pet(PetAction::Groom))
        );
    }

    #[test]
    fn choose_parses_variant() {
        assert_eq!(
            parse_command("choose Ember Phoenix").unwrap(),
            Some(Command::Choose {
                name: "Ember".into(),
                variant: Variant::Phoenix
            })
        );
        assert!(matches!(
            parse_command("choose Ember unicorn"),
            Err(CommandError::Variant(_))
        ));
        assert!(matches!(
            parse_command("choose Ember"),
            Err(CommandError::Usage(_))
        ));
    }

    #[test]
    fn use_checks_category_and_index() {
        assert_eq!(
            parse_command("use gift 5").unwrap(),
            Some(Command::Use {
                category: ItemCategory::Gift,
                index: 5
            })
        );
        assert_eq!(
            parse_command("use food 10").unwrap(),
            Some(Command::Use {
                category: ItemCategory::Food,
                index: 10
            })
        );
        assert!(matches!(parse_command("use bath 6"), Err(CommandError::Usage(_))));
        assert!(matches!(parse_command("use bath 0"), Err(CommandError::Usage(_))));
        assert!(matches!(parse_command("use toys 1"), Err(CommandError::Category(_))));
    }

    #[test]
    fn new_keeps_multi_word_usernames() {
        assert_eq!(
            parse_command("new Ada Lovelace").unwrap(),
            Some(Command::New("Ada Lovelace".into()))
        );
        assert!(matches!(parse_command("new"), Err(CommandError::Usage(_))));
        assert!(matches!(parse_command("load x"), Err(CommandError::Usage(_))));
        assert_eq!(
            parse_command("dance"),
            Err(CommandError::Unknown("dance".into()))
        );
    }
}
