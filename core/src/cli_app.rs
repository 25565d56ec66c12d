use colored::*;
use parley_core::directory::{Course, InMemoryDirectory, UserRecord};
use parley_core::{
    Config, CourseId, Message, MessageId, MessageKind, Messenger, ReadFilter, UserId, UserDirectory,
};
use parley_core::utils::EventEmitter;
use std::sync::Arc;
use tracing::warn;

/// Command-line front end over a local data directory
pub fn run(bin: &str, config: Config, args: Vec<String>) -> anyhow::Result<()> {
    let Some(command) = args.first().cloned() else {
        print_usage(bin);
        return Ok(());
    };
    let rest = &args[1..];

    if config.data_dir.is_none() {
        warn!("No --data-dir given; using a temporary store that is discarded on exit");
    }
    let directory = Arc::new(match &config.data_dir {
        Some(dir) => InMemoryDirectory::load(dir)?,
        None => InMemoryDirectory::new(),
    });
    let data_dir = config.data_dir.clone();
    let messenger = Messenger::open(
        config,
        directory.clone(),
        directory.clone(),
        Arc::new(EventEmitter::new()),
    )?;

    match command.as_str() {
        "add-user" => {
            if rest.len() < 2 {
                return usage(bin, "add-user <id> <fullname> [--email E] [--city C] [--country C]");
            }
            let mut record = UserRecord::new(parse_user(&rest[0])?, "");
            let mut name = Vec::new();
            let mut i = 1;
            while i < rest.len() {
                match (rest[i].as_str(), rest.get(i + 1)) {
                    ("--email", Some(v)) => record.email = Some(v.clone()),
                    ("--city", Some(v)) => record.city = Some(v.clone()),
                    ("--country", Some(v)) => record.country = Some(v.clone()),
                    (flag @ ("--email" | "--city" | "--country"), None) => {
                        anyhow::bail!("{} requires a value", flag)
                    }
                    (word, _) => {
                        name.push(word.to_string());
                        i += 1;
                        continue;
                    }
                }
                i += 2;
            }
            record.fullname = name.join(" ");
            println!("{} Added {} ({})", "✓".green().bold(), record.fullname.cyan(), record.id);
            directory.add_user(record);
            save_directory(&directory, data_dir.as_deref())?;
        }
        "add-course" => {
            if rest.len() < 3 {
                return usage(bin, "add-course <id> <shortname> <fullname>");
            }
            let course = Course {
                id: CourseId(parse_id(&rest[0])?),
                shortname: rest[1].clone(),
                fullname: rest[2..].join(" "),
            };
            println!("{} Added course {} ({})", "✓".green().bold(), course.fullname.cyan(), course.shortname);
            directory.add_course(course);
            save_directory(&directory, data_dir.as_deref())?;
        }
        "enrol" => {
            if rest.len() < 2 {
                return usage(bin, "enrol <user> <course>");
            }
            directory.enrol(parse_user(&rest[0])?, CourseId(parse_id(&rest[1])?))?;
            println!("{} Enrolled", "✓".green().bold());
            save_directory(&directory, data_dir.as_deref())?;
        }
        "touch" => {
            if rest.is_empty() {
                return usage(bin, "touch <user>");
            }
            directory.touch(parse_user(&rest[0])?, chrono::Utc::now())?;
            save_directory(&directory, data_dir.as_deref())?;
        }
        "send" => {
            if rest.len() < 3 {
                return usage(bin, "send <from> <to> <message> [--notification]");
            }
            let kind = if rest.iter().any(|a| a == "--notification") {
                MessageKind::Notification
            } else {
                MessageKind::Message
            };
            let body = rest[2..]
                .iter()
                .filter(|a| a.as_str() != "--notification")
                .cloned()
                .collect::<Vec<_>>()
                .join(" ");
            let msg = messenger.send(parse_user(&rest[0])?, parse_user(&rest[1])?, &body, kind)?;
            println!("{} Message sent! ID: {}", "✓".green().bold(), msg.id.to_string().cyan());
        }
        "messages" => {
            if rest.len() < 2 {
                return usage(bin, "messages <user> <other>");
            }
            let user = parse_user(&rest[0])?;
            let messages = messenger.get_messages(user, parse_user(&rest[1])?)?;
            if messages.is_empty() {
                println!("{}", "No messages".yellow());
            }
            for m in &messages {
                print_message(&directory, user, m);
            }
        }
        "conversations" => {
            if rest.is_empty() {
                return usage(bin, "conversations <user>");
            }
            let user = parse_user(&rest[0])?;
            let convs = messenger.get_conversations(user)?;
            println!("{}", format!("Conversations ({})", convs.len()).bright_cyan().bold());
            println!("{}", "─".repeat(60).dimmed());
            for c in convs {
                let name = c.fullname.unwrap_or_else(|| c.counterpart.to_string());
                let unread = if c.unread_count > 0 {
                    format!("{} unread", c.unread_count).yellow().bold()
                } else {
                    "read".dimmed()
                };
                let mut flags = Vec::new();
                if c.is_online {
                    flags.push("online".green());
                }
                if c.is_blocked {
                    flags.push("blocked".red());
                }
                println!("  {} [{}] {}", name.cyan(), unread, flags.iter().map(|f| f.to_string()).collect::<Vec<_>>().join(" "));
                println!("    {}", c.last_message.body.dimmed());
            }
        }
        "unread" => {
            if rest.is_empty() {
                return usage(bin, "unread <user> [from]");
            }
            let user = parse_user(&rest[0])?;
            let from = rest.get(1).map(|s| parse_user(s)).transpose()?;
            let messages = messenger.count_unread_messages(user, from)?;
            let conversations = messenger.count_unread_conversations(user)?;
            println!(
                "{} unread message(s) in {} conversation(s)",
                messages.to_string().yellow().bold(),
                conversations.to_string().yellow()
            );
        }
        "read" => {
            if rest.len() < 2 {
                return usage(bin, "read <user> <message_id>|all [--from U] [--kind K]");
            }
            let user = parse_user(&rest[0])?;
            if rest[1] == "all" {
                let filter = parse_read_filter(&rest[2..])?;
                let n = messenger.mark_all_read_for_user(user, filter)?;
                println!("{} Marked {} message(s) read", "✓".green().bold(), n.to_string().cyan());
            } else {
                let msg = messenger.mark_read(user, MessageId(parse_id(&rest[1])?))?;
                println!("{} {} read", "✓".green().bold(), msg.id.to_string().cyan());
            }
        }
        "delete-conversation" => {
            if rest.len() < 2 {
                return usage(bin, "delete-conversation <user> <other>");
            }
            let n = messenger.delete_conversation(parse_user(&rest[0])?, parse_user(&rest[1])?)?;
            println!("{} Removed {} message(s) from view", "✓".green().bold(), n);
        }
        "contacts" => {
            if rest.is_empty() {
                return usage(bin, "contacts <user>");
            }
            let owner = parse_user(&rest[0])?;
            let contacts = messenger.get_contacts(owner)?;
            if contacts.is_empty() {
                println!("{}", "No contacts".yellow());
            } else {
                println!(
                    "{}",
                    format!("Contacts ({}, {} blocked)", contacts.len(), messenger.count_blocked(owner)?)
                        .bright_cyan()
                        .bold()
                );
                for c in contacts {
                    let name = c.fullname.unwrap_or_else(|| c.user_id.to_string());
                    let state = if c.is_blocked {
                        "blocked".red()
                    } else if c.is_online {
                        "online".green()
                    } else {
                        "offline".dimmed()
                    };
                    println!("  {} ({}) [{}]", name.cyan(), c.user_id, state);
                }
            }
        }
        "add-contact" | "remove-contact" | "block" | "unblock" => {
            if rest.len() < 2 {
                return usage(bin, &format!("{} <owner> <user>", command));
            }
            let (owner, other) = (parse_user(&rest[0])?, parse_user(&rest[1])?);
            match command.as_str() {
                "add-contact" => {
                    messenger.add_contact(owner, other)?;
                }
                "remove-contact" => {
                    if !messenger.remove_contact(owner, other)? {
                        println!("{}", "Not a contact".yellow());
                        return Ok(());
                    }
                }
                "block" => {
                    messenger.block_user(owner, other)?;
                }
                _ => {
                    if !messenger.unblock_user(owner, other)? {
                        println!("{}", "Not a contact".yellow());
                        return Ok(());
                    }
                }
            }
            println!("{} Done", "✓".green().bold());
        }
        "profile" => {
            if rest.len() < 2 {
                return usage(bin, "profile <viewer> <user>");
            }
            let p = messenger.get_profile(parse_user(&rest[0])?, parse_user(&rest[1])?)?;
            println!("{}", p.fullname.bright_cyan().bold());
            let hidden = || "-".dimmed().to_string();
            println!("  email:   {}", p.email.unwrap_or_else(hidden));
            println!("  city:    {}", p.city.unwrap_or_else(hidden));
            println!("  country: {}", p.country.unwrap_or_else(hidden));
            println!(
                "  online: {}  contact: {}  blocked: {}",
                p.is_online, p.is_contact, p.is_blocked
            );
        }
        "search-users" => {
            if rest.len() < 2 {
                return usage(bin, "search-users <user> <query>");
            }
            let results = messenger.search_users(parse_user(&rest[0])?, &rest[1..].join(" "))?;
            println!("{}", "Contacts".bright_white().bold());
            for c in &results.contacts {
                println!("  {} ({})", c.fullname.as_deref().unwrap_or("?").cyan(), c.user_id);
            }
            println!("{}", "Courses".bright_white().bold());
            for c in &results.courses {
                println!("  {} [{}] ({})", c.fullname.cyan(), c.shortname, c.id);
            }
            println!("{}", "Other users".bright_white().bold());
            for c in &results.non_contacts {
                println!("  {} ({})", c.fullname.as_deref().unwrap_or("?").cyan(), c.user_id);
            }
        }
        "search-messages" => {
            if rest.len() < 2 {
                return usage(bin, "search-messages <user> <query>");
            }
            let user = parse_user(&rest[0])?;
            let hits = messenger.search_messages(user, &rest[1..].join(" "))?;
            if hits.is_empty() {
                println!("{}", "No matches".yellow());
            }
            for hit in hits {
                print_message(&directory, user, &hit.message);
            }
        }
        "search-course" => {
            if rest.len() < 3 {
                return usage(bin, "search-course <user> <course> <query>");
            }
            let hits = messenger.search_users_in_course(
                parse_user(&rest[0])?,
                CourseId(parse_id(&rest[1])?),
                &rest[2..].join(" "),
            )?;
            for h in hits {
                let mut flags = Vec::new();
                if h.is_contact {
                    flags.push("contact");
                }
                if h.is_blocked {
                    flags.push("blocked");
                }
                if h.is_messaging {
                    flags.push("messaging");
                }
                if h.is_online {
                    flags.push("online");
                }
                println!("  {} ({}) {}", h.fullname.cyan(), h.user_id, flags.join(", ").dimmed());
            }
        }
        _ => {
            eprintln!("{} Unknown command: {}", "✗".red().bold(), command.red());
            print_usage(bin);
        }
    }

    messenger.flush()?;
    Ok(())
}

fn parse_id(s: &str) -> anyhow::Result<u64> {
    s.parse::<u64>()
        .map_err(|_| anyhow::anyhow!("Expected a numeric id, got {:?}", s))
}

fn parse_user(s: &str) -> anyhow::Result<UserId> {
    Ok(UserId(parse_id(s)?))
}

/// `[--from U] [--kind K]` in any order
fn parse_read_filter(opts: &[String]) -> anyhow::Result<ReadFilter> {
    let mut filter = ReadFilter::any();
    let mut opts = opts.iter();
    while let Some(opt) = opts.next() {
        match opt.as_str() {
            "--from" => {
                let value = opts.next().ok_or_else(|| anyhow::anyhow!("--from requires a user"))?;
                filter.from = Some(parse_user(value)?);
            }
            "--kind" => {
                let value = opts.next().ok_or_else(|| anyhow::anyhow!("--kind requires a kind"))?;
                filter.kind = Some(value.parse::<MessageKind>().map_err(anyhow::Error::msg)?);
            }
            other => anyhow::bail!("Unknown option: {}", other),
        }
    }
    Ok(filter)
}

fn usage(bin: &str, form: &str) -> anyhow::Result<()> {
    eprintln!("{}", format!("Usage: {} {}", bin, form).yellow());
    Ok(())
}

fn save_directory(directory: &InMemoryDirectory, data_dir: Option<&std::path::Path>) -> anyhow::Result<()> {
    if let Some(dir) = data_dir {
        directory.save(dir)?;
    }
    Ok(())
}

fn print_message(directory: &InMemoryDirectory, viewer: UserId, m: &Message) {
    let who = if m.from == viewer {
        "me".to_string()
    } else {
        directory
            .user(m.from)
            .map(|u| u.fullname)
            .unwrap_or_else(|| m.from.to_string())
    };
    let marker = if m.to == viewer && !m.is_read() {
        "●".yellow()
    } else {
        " ".normal()
    };
    println!(
        "{} {} {} {}",
        marker,
        m.time_created.format("%Y-%m-%d %H:%M").to_string().dimmed(),
        format!("{}:", who).cyan(),
        m.body
    );
}

fn print_usage(bin: &str) {
    println!("{}", "⚡ Parley CLI".bright_cyan().bold());
    println!();
    println!("{}", "Usage:".bright_white().bold());
    println!("  {} [--data-dir DIR] [--online-window SECS] [--search-limit N] <command> [args]", bin.cyan());
    println!();
    println!("{}", "Directory:".bright_white().bold());
    println!("  {} <id> <fullname>          Add or replace a user", "add-user".cyan());
    println!("  {} <id> <short> <full>    Add or replace a course", "add-course".cyan());
    println!("  {} <user> <course>             Enrol a user in a course", "enrol".cyan());
    println!("  {} <user>                      Record an access now", "touch".cyan());
    println!();
    println!("{}", "Messaging:".bright_white().bold());
    println!("  {} <from> <to> <message>        Send a message", "send".cyan());
    println!("  {} <user> <other>           Show a conversation", "messages".cyan());
    println!("  {} <user>              List conversations", "conversations".cyan());
    println!("  {} <user> [from]              Unread counts", "unread".cyan());
    println!("  {} <user> <id>|all [--from U] [--kind K]", "read".cyan());
    println!("  {} <user> <other> Hide a conversation", "delete-conversation".cyan());
    println!();
    println!("{}", "Contacts:".bright_white().bold());
    println!("  {} <user>                   List contacts", "contacts".cyan());
    println!("  {} <owner> <user>        Add a contact", "add-contact".cyan());
    println!("  {} <owner> <user>     Remove a contact", "remove-contact".cyan());
    println!("  {} <owner> <user>              Block a user", "block".cyan());
    println!("  {} <owner> <user>            Unblock a user", "unblock".cyan());
    println!("  {} <viewer> <user>           Show a profile", "profile".cyan());
    println!();
    println!("{}", "Search:".bright_white().bold());
    println!("  {} <user> <query>       Users and courses", "search-users".cyan());
    println!("  {} <user> <query>    Message bodies", "search-messages".cyan());
    println!("  {} <user> <course> <query> Course participants", "search-course".cyan());
}
