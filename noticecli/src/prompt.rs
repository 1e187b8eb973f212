//! Interactive questions asked when the CLI runs in a terminal

use crate::discover::{self, Discovered};
use anyhow::Result;
use colored::*;
use std::io::{BufRead, Write};
use std::path::PathBuf;

/// Read one trimmed line; `None` at end of input
fn ask<R: BufRead, W: Write>(input: &mut R, out: &mut W, question: &str) -> Result<Option<String>> {
    write!(out, "{}", question)?;
    out.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Ask for the folder until a non-empty answer is given
pub fn ask_dir<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> Result<PathBuf> {
    loop {
        match ask(
            input,
            out,
            "Folder with the notification sheet and arrangement tables: ",
        )? {
            None => anyhow::bail!("No folder given"),
            Some(line) if !line.is_empty() => return Ok(PathBuf::from(line)),
            Some(_) => {}
        }
    }
}

/// Yes unless the answer is something other than `y`
pub fn ask_highlight<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> Result<bool> {
    let answer = ask(
        input,
        out,
        "Write student names and colour the filled rows? (Y/n): ",
    )?;
    Ok(answer.is_none_or(|a| a.is_empty() || a.eq_ignore_ascii_case("y")))
}

fn print_files<W: Write>(out: &mut W, files: &[PathBuf]) -> Result<()> {
    writeln!(out, "{}", "=".repeat(60))?;
    for (i, file) in files.iter().enumerate() {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.display().to_string());
        writeln!(out, " {:2} : {}", i + 1, name)?;
    }
    writeln!(out, "{}", "=".repeat(60))?;
    Ok(())
}

/// 1-based list numbers separated by spaces, checked against `len`
fn parse_numbers(answer: &str, len: usize) -> Option<Vec<usize>> {
    answer
        .split_whitespace()
        .map(|n| n.parse::<usize>().ok().filter(|&n| (1..=len).contains(&n)))
        .collect()
}

/// Show the numbered workbook list, pick the notification sheet and drop
/// the files that are not arrangement tables
pub fn pick_roles<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    mut files: Vec<PathBuf>,
) -> Result<Discovered> {
    if files.len() < 2 {
        anyhow::bail!(
            "Found {} workbook(s); a notification sheet and at least one arrangement table are needed",
            files.len()
        );
    }

    let default = discover::guess_notification(&files);
    print_files(out, &files)?;
    let notification = loop {
        let question = match default {
            Some(i) => format!("Number of the notification sheet (Enter for {}): ", i + 1),
            None => "Number of the notification sheet: ".to_string(),
        };
        let Some(answer) = ask(input, out, &question)? else {
            anyhow::bail!("No notification sheet chosen");
        };
        if answer.is_empty() {
            if let Some(i) = default {
                break files.remove(i);
            }
            continue;
        }
        match parse_numbers(&answer, files.len()).as_deref() {
            Some([n]) => break files.remove(n - 1),
            _ => writeln!(out, "{}", "Enter one number from the list".yellow())?,
        }
    };

    loop {
        print_files(out, &files)?;
        let Some(answer) = ask(
            input,
            out,
            "Numbers of files to leave out, separated by spaces (Enter to keep all): ",
        )?
        else {
            break;
        };
        if answer.is_empty() {
            break;
        }
        let Some(mut numbers) = parse_numbers(&answer, files.len()) else {
            writeln!(out, "{}", "Enter numbers from the list".yellow())?;
            continue;
        };
        numbers.sort_unstable();
        numbers.dedup();
        if numbers.len() == files.len() {
            writeln!(out, "{}", "At least one arrangement table must stay".yellow())?;
            continue;
        }
        for n in numbers.into_iter().rev() {
            files.remove(n - 1);
        }
    }

    Ok(Discovered {
        notification,
        arrangements: files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn files() -> Vec<PathBuf> {
        vec![
            PathBuf::from("/d/省开.xls"),
            PathBuf::from("/d/纸考考试通知单.xls"),
            PathBuf::from("/d/统设.xls"),
            PathBuf::from("/d/说明.xlsx"),
        ]
    }

    #[test]
    fn test_highlight_defaults_to_yes() {
        let mut out = Vec::new();
        assert!(ask_highlight(&mut Cursor::new("\n"), &mut out).unwrap());
        assert!(ask_highlight(&mut Cursor::new("y\n"), &mut out).unwrap());
        assert!(ask_highlight(&mut Cursor::new(""), &mut out).unwrap());
        assert!(!ask_highlight(&mut Cursor::new("n\n"), &mut out).unwrap());
        assert!(!ask_highlight(&mut Cursor::new("no\n"), &mut out).unwrap());
    }

    #[test]
    fn test_enter_takes_guessed_notification_and_keeps_all() {
        let mut out = Vec::new();
        let found = pick_roles(&mut Cursor::new("\n\n"), &mut out, files()).unwrap();

        assert_eq!(found.notification, PathBuf::from("/d/纸考考试通知单.xls"));
        assert_eq!(found.arrangements.len(), 3);
        let shown = String::from_utf8(out).unwrap();
        assert!(shown.contains("  2 : 纸考考试通知单.xls"));
        assert!(shown.contains("(Enter for 2)"));
    }

    #[test]
    fn test_pick_notification_and_exclude_by_number() {
        let mut out = Vec::new();
        // List after picking 1: 纸考考试通知单, 统设, 说明
        let found = pick_roles(&mut Cursor::new("1\nx 9\n3 1\n\n"), &mut out, files()).unwrap();

        assert_eq!(found.notification, PathBuf::from("/d/省开.xls"));
        assert_eq!(found.arrangements, vec![PathBuf::from("/d/统设.xls")]);
        assert!(String::from_utf8(out).unwrap().contains("Enter numbers from the list"));
    }

    #[test]
    fn test_cannot_exclude_every_arrangement() {
        let mut out = Vec::new();
        let found = pick_roles(&mut Cursor::new("2\n1 2 3\n\n"), &mut out, files()).unwrap();

        assert_eq!(found.arrangements.len(), 3);
    }

    #[test]
    fn test_ask_dir_skips_blank_answers() {
        let mut out = Vec::new();
        let dir = ask_dir(&mut Cursor::new("\n  \n/data/考试\n"), &mut out).unwrap();
        assert_eq!(dir, PathBuf::from("/data/考试"));
        assert!(ask_dir(&mut Cursor::new(""), &mut out).is_err());
    }
}
