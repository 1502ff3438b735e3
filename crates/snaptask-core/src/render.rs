use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use snaptask_shared::Task;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::remote::TaskBackend;
use crate::viewmodel::{ACCEPTED_IMAGE_EXTENSIONS, TaskViewModel};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self {
            color: color && io::stdout().is_terminal(),
        })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    /// Draws the whole screen: who is signed in, the list, and the form.
    #[tracing::instrument(skip_all)]
    pub fn render_screen<B, W>(&self, mut out: W, vm: &TaskViewModel<B>) -> anyhow::Result<()>
    where
        B: TaskBackend,
        W: Write,
    {
        match vm.identity() {
            Some(identity) => writeln!(out, "Signed in as {identity}")?,
            None => writeln!(out, "Not signed in")?,
        }
        writeln!(out)?;
        writeln!(out, "{}", self.paint("Tasks", "1"))?;

        if vm.is_loading() {
            writeln!(out, "Loading...")?;
        } else if vm.tasks().is_empty() {
            writeln!(out, "No tasks found")?;
        } else {
            self.write_task_table(&mut out, vm.tasks())?;
        }

        self.write_form(&mut out, vm)?;
        Ok(())
    }

    fn write_task_table<W: Write>(&self, out: &mut W, tasks: &[Task]) -> anyhow::Result<()> {
        let headers = vec![
            "Done".to_string(),
            "ID".to_string(),
            "Name".to_string(),
            "Image".to_string(),
        ];

        let rows = tasks
            .iter()
            .map(|task| {
                let check = if task.is_done {
                    self.paint("[x]", "32")
                } else {
                    "[ ]".to_string()
                };
                let image = if task.has_image() {
                    task.image_url.clone().unwrap_or_default()
                } else {
                    String::new()
                };
                vec![
                    check,
                    self.paint(&task.id.to_string(), "33"),
                    task.name.clone(),
                    image,
                ]
            })
            .collect();

        write_table(&mut *out, headers, rows)?;
        writeln!(out)?;
        writeln!(
            out,
            "{}",
            self.paint("done/undone <id> toggles a task, delete <id> removes it", "2")
        )?;
        Ok(())
    }

    fn write_form<B: TaskBackend, W: Write>(
        &self,
        out: &mut W,
        vm: &TaskViewModel<B>,
    ) -> anyhow::Result<()> {
        let has_input = !vm.name().is_empty() || vm.preview_url().is_some() || vm.file_type_error();
        if !has_input {
            return Ok(());
        }

        writeln!(out)?;
        writeln!(out, "New task")?;
        writeln!(out, "  name     {}", vm.name())?;
        if let Some(preview) = vm.preview_url() {
            writeln!(out, "  preview  {preview}")?;
        }
        if vm.file_type_error() {
            let message = format!(
                "  only {} files can be attached",
                ACCEPTED_IMAGE_EXTENSIONS.join(", ")
            );
            writeln!(out, "{}", self.paint(&message, "31"))?;
        }
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
