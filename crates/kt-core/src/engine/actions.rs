//! The action surface bound into recipes as the global `r` table
//!
//! [`RecipeActions`] has one method per action and works on bridged values
//! only. [`install`] adapts it to Lua: arguments go through the value bridge,
//! results come back as Lua values, and action errors are raised as Lua
//! errors so recipes can `pcall` them.

use super::bridge::{from_lua, map_from_lua, options_from_lua, to_list, to_lua};
use super::error::{EngineError, Result};
use super::interaction::{EditOutcome, Interaction};
use super::order::RecipeSource;
use super::prompts::{resolve_prompt, PromptField, ResolvedPrompt};
use super::report::Event;
use super::run::{ConfigTemplate, Mode, Run};
use super::value::{Map, Value};
use crate::config::ConfigFormat;
use crate::runtime::run_inherited;
use crate::templates::{split_scope, ResourceKind, ResourceLookup, TemplateRenderer};
use mlua::{FromLuaMulti, Function, IntoLuaMulti, Lua, Table, Value as LuaValue};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

const EDIT_HEADER: &str = "Please fill in the values.";
const DEFAULT_GATE_PROMPT: &str = "Continue?";

/// Capabilities a recipe may use
pub trait RecipeActions {
    /// Deep-merge fields into the context
    fn declare(&self, fields: Map) -> Result<()>;
    /// Collect a prompt schema and make sure every field has a value
    fn prompt(&self, schema: Map) -> Result<()>;
    fn template(&self, name: &str, options: Map) -> Result<()>;
    fn asset(&self, name: &str, options: Map) -> Result<()>;
    /// Whether the body of a `r.command` block should run
    fn command(&self, options: Map) -> Result<bool>;
    fn run(&self, parts: Vec<String>, options: Map) -> Result<()>;
    fn gate(&self, options: Map) -> Result<bool>;
    fn touch(&self, path: &str, options: Map) -> Result<()>;
    fn mkdir(&self, path: &str, options: Map) -> Result<()>;
    fn f(&self, template: &str) -> String;
    /// Value at a dotted path, `None` when absent
    fn reference(&self, path: &str) -> Option<Value>;
    fn splice(&self, path: &str) -> Vec<Value>;
    /// Select the template the config document is rendered with
    fn config(&self, name: &str) -> Result<()>;
}

/// Install `actions` as the global `r` table
pub fn install<A: RecipeActions + 'static>(lua: &Lua, actions: Rc<A>) -> mlua::Result<()> {
    let r = lua.create_table()?;

    bind(lua, &r, "declare", &actions, |_, a, fields: Table| {
        Ok(a.declare(map_from_lua(&fields, "declare")?)?)
    })?;
    bind(lua, &r, "prompt", &actions, |_, a, schema: Table| {
        Ok(a.prompt(map_from_lua(&schema, "prompt")?)?)
    })?;
    bind(
        lua,
        &r,
        "template",
        &actions,
        |_, a, (name, options): (String, Option<Table>)| {
            Ok(a.template(&name, options_from_lua(options.as_ref(), "template")?)?)
        },
    )?;
    for alias in ["asset", "assets"] {
        bind(
            lua,
            &r,
            alias,
            &actions,
            |_, a, (name, options): (String, Option<Table>)| {
                Ok(a.asset(&name, options_from_lua(options.as_ref(), "asset")?)?)
            },
        )?;
    }
    bind(
        lua,
        &r,
        "command",
        &actions,
        |_, a, (options, body): (Option<Table>, Function)| {
            if a.command(options_from_lua(options.as_ref(), "command")?)? {
                body.call::<()>(())?;
            }
            Ok(())
        },
    )?;
    bind(
        lua,
        &r,
        "run",
        &actions,
        |_, a, (parts, options): (LuaValue, Option<Table>)| {
            let parts = to_list(Some(&from_lua(&parts, "run")?))
                .iter()
                .map(Value::to_string)
                .collect();
            Ok(a.run(parts, options_from_lua(options.as_ref(), "run")?)?)
        },
    )?;
    bind(lua, &r, "gate", &actions, |_, a, options: Option<Table>| {
        Ok(a.gate(options_from_lua(options.as_ref(), "gate")?)?)
    })?;
    bind(
        lua,
        &r,
        "touch",
        &actions,
        |_, a, (path, options): (String, Option<Table>)| {
            Ok(a.touch(&path, options_from_lua(options.as_ref(), "touch")?)?)
        },
    )?;
    bind(
        lua,
        &r,
        "mkdir",
        &actions,
        |_, a, (path, options): (String, Option<Table>)| {
            Ok(a.mkdir(&path, options_from_lua(options.as_ref(), "mkdir")?)?)
        },
    )?;
    bind(lua, &r, "f", &actions, |_, a, template: String| {
        Ok(a.f(&template))
    })?;
    bind(lua, &r, "ref", &actions, |lua, a, path: String| {
        match a.reference(&path) {
            Some(value) => to_lua(lua, &value),
            None => Ok(LuaValue::String(lua.create_string("")?)),
        }
    })?;
    bind(lua, &r, "splice", &actions, |lua, a, path: String| {
        to_lua(lua, &Value::List(a.splice(&path)))
    })?;
    bind(lua, &r, "config", &actions, |_, a, name: String| {
        Ok(a.config(&name)?)
    })?;

    lua.globals().set("r", r)
}

fn bind<T, Args, R, F>(lua: &Lua, r: &Table, name: &str, actions: &Rc<T>, func: F) -> mlua::Result<()>
where
    T: 'static,
    Args: FromLuaMulti,
    R: IntoLuaMulti,
    F: Fn(&Lua, &T, Args) -> mlua::Result<R> + 'static,
{
    let actions = Rc::clone(actions);
    let function = lua.create_function(move |lua, args: Args| func(lua, &*actions, args))?;
    r.set(name, function)
}

/// [`RecipeActions`] for one run
pub(crate) struct Dispatcher {
    run: RefCell<Run>,
    source: RecipeSource,
    catalog: Box<dyn ResourceLookup>,
    interaction: RefCell<Box<dyn Interaction>>,
    renderer: TemplateRenderer,
    edit_format: ConfigFormat,
    echo: bool,
}

impl Dispatcher {
    pub(crate) fn new(
        run: Run,
        source: RecipeSource,
        catalog: Box<dyn ResourceLookup>,
        interaction: Box<dyn Interaction>,
        edit_format: ConfigFormat,
        echo: bool,
    ) -> Self {
        Self {
            run: RefCell::new(run),
            source,
            catalog,
            interaction: RefCell::new(interaction),
            renderer: TemplateRenderer::new(),
            edit_format,
            echo,
        }
    }

    /// Take the run state out, leaving an empty one behind
    pub(crate) fn take_run(&self) -> Run {
        self.run.take()
    }

    fn mode(&self) -> Mode {
        self.run.borrow().mode
    }

    fn emit(&self, event: Event) {
        if self.echo {
            event.report();
        }
        self.run.borrow_mut().events.push(event);
    }

    /// Fetch a `<scope>::<name>` resource, reporting a miss
    fn fetch(&self, qualified: &str, kind: ResourceKind) -> Option<Vec<u8>> {
        let (scope, name) = split_scope(qualified);
        match self.catalog.lookup(scope, name, kind) {
            Ok(Some(content)) => Some(content),
            Ok(None) => {
                self.emit(Event::NotFound {
                    kind: kind.name(),
                    name: qualified.to_string(),
                });
                None
            }
            Err(err) => {
                self.emit(Event::Failed {
                    what: format!("loading {} '{}'", kind, qualified),
                    detail: format!("{:#}", err),
                });
                None
            }
        }
    }

    /// Write `content` unless the destination exists and `overwrite` is off
    fn write_output(
        &self,
        path: PathBuf,
        content: &[u8],
        overwrite: bool,
        done: fn(PathBuf) -> Event,
    ) -> Result<()> {
        if path.exists() && !overwrite {
            self.emit(Event::Skipped(path));
            return Ok(());
        }
        create_parent(&path)?;
        std::fs::write(&path, content).map_err(|e| EngineError::io("write", &path, e))?;
        self.emit(done(path));
        Ok(())
    }

    /// Edit-session document for a prompt: header, then the current values
    fn edit_document(&self, resolved: &ResolvedPrompt) -> Result<String> {
        let mut header = vec![EDIT_HEADER.to_string()];
        if let Some(comment) = &resolved.schema.comment {
            header.push(String::new());
            header.push(comment.clone());
        }
        let annotations = resolved.schema.annotations();
        if !annotations.is_empty() {
            header.push(String::new());
            header.extend(
                annotations
                    .into_iter()
                    .map(|(path, text)| format!("{}: {}", path, text)),
            );
        }
        let body = self
            .edit_format
            .serialize(&Value::Map(resolved.values.clone()))?;
        Ok(self.edit_format.with_header(&header, &body))
    }

    /// Merge an edited document into the context; a bad document is reported
    fn apply_edit(&self, text: &str) {
        match self.edit_format.parse(text) {
            Ok(Value::Map(fields)) => self.run.borrow_mut().context.merge(fields),
            Ok(Value::Null) => {}
            Ok(other) => self.emit(Event::Failed {
                what: "reading prompt answers".to_string(),
                detail: format!("expected a table of fields, got '{}'", other),
            }),
            Err(err) => self.emit(Event::Failed {
                what: "reading prompt answers".to_string(),
                detail: err.to_string(),
            }),
        }
    }
}

impl RecipeActions for Dispatcher {
    fn declare(&self, fields: Map) -> Result<()> {
        self.run.borrow_mut().context.merge(fields);
        Ok(())
    }

    fn prompt(&self, schema: Map) -> Result<()> {
        let resolved = {
            let mut run = self.run.borrow_mut();
            run.prompt_calls += 1;
            let span = self.source.prompt_span(run.prompt_calls);
            let resolved = resolve_prompt(schema, &run.context, span.as_ref())?;
            run.collected.merge(resolved.schema.clone())?;
            resolved
        };

        match self.mode() {
            Mode::GenerateConfig => {
                self.run.borrow_mut().context.merge(resolved.values);
                return Ok(());
            }
            Mode::Execute if !resolved.needs_input() => return Ok(()),
            Mode::Execute => {}
        }

        let document = self.edit_document(&resolved)?;
        let outcome = self
            .interaction
            .borrow_mut()
            .edit(&document, self.edit_format.extension())
            .map_err(EngineError::Interaction)?;
        match outcome {
            EditOutcome::Saved(text) => self.apply_edit(&text),
            EditOutcome::Abandoned => {
                self.run.borrow_mut().context.merge(resolved.values);
                self.emit(Event::UsedDefaults);
            }
        }
        Ok(())
    }

    fn template(&self, name: &str, options: Map) -> Result<()> {
        if !self.mode().performs_side_effects() {
            return Ok(());
        }
        let output = required(&options, "template", "output")?;
        let Some(content) = self.fetch(name, ResourceKind::Template) else {
            return Ok(());
        };
        let path = PathBuf::from(output);
        let overwrite = flag(&options, "overwrite");
        if path.exists() && !overwrite {
            self.emit(Event::Skipped(path));
            return Ok(());
        }

        let mut data = self.run.borrow().context.to_value();
        if let Some(extra @ Value::Map(_)) = options.get("context") {
            data.merge(extra.clone());
        }
        let text = String::from_utf8_lossy(&content);
        match self.renderer.render(&text, &data) {
            Ok(rendered) => self.write_output(path, rendered.as_bytes(), true, Event::Rendered),
            Err(err) => {
                self.emit(Event::Failed {
                    what: format!("rendering template {}", name),
                    detail: err.to_string(),
                });
                Ok(())
            }
        }
    }

    fn asset(&self, name: &str, options: Map) -> Result<()> {
        if !self.mode().performs_side_effects() {
            return Ok(());
        }
        let destination = required(&options, "asset", "destination")?;
        let Some(content) = self.fetch(name, ResourceKind::Asset) else {
            return Ok(());
        };
        self.write_output(
            PathBuf::from(destination),
            &content,
            flag(&options, "overwrite"),
            Event::Copied,
        )
    }

    fn command(&self, options: Map) -> Result<bool> {
        if let Some(check) = options.get("check").filter(|v| !v.is_null()) {
            let run = self.run.borrow();
            if !run
                .context
                .get(&check.to_string())
                .is_some_and(Value::is_truthy)
            {
                return Ok(false);
            }
        }
        Ok(self.mode().performs_side_effects())
    }

    fn run(&self, parts: Vec<String>, options: Map) -> Result<()> {
        if !self.mode().performs_side_effects() {
            return Ok(());
        }
        if parts.is_empty() {
            return Err(EngineError::invalid("run", "the command is empty"));
        }
        let cwd = options
            .get("cwd")
            .filter(|v| !v.is_null())
            .map(|v| PathBuf::from(v.to_string()));

        self.emit(Event::Running(parts.clone()));
        if let Err(err) = run_inherited(&parts, cwd.as_deref()) {
            self.emit(Event::CommandFailed {
                command: parts,
                detail: err.to_string(),
            });
        }
        Ok(())
    }

    fn gate(&self, options: Map) -> Result<bool> {
        let prompt = options
            .get("prompt")
            .filter(|v| !v.is_null())
            .map(Value::to_string)
            .unwrap_or_else(|| DEFAULT_GATE_PROMPT.to_string());
        let default = match options.get("default") {
            None | Some(Value::Null) => true,
            Some(value) => value.is_truthy(),
        };
        let store = options
            .get("store")
            .filter(|v| !v.is_null())
            .map(Value::to_string);

        if let Some(store) = &store {
            self.run.borrow_mut().collected.insert_field(
                store,
                PromptField {
                    default: Value::Bool(default),
                    comment: Some(prompt.clone()),
                },
            )?;
        }

        if self.mode() == Mode::GenerateConfig {
            if let Some(store) = &store {
                self.run
                    .borrow_mut()
                    .context
                    .set(store, Value::Bool(default));
            }
            return Ok(default);
        }

        if let Some(store) = &store {
            if let Some(known) = self.run.borrow().context.get(store) {
                return Ok(known.is_truthy());
            }
        }

        let answer = self
            .interaction
            .borrow_mut()
            .confirm(&prompt, default)
            .map_err(EngineError::Interaction)?;
        if let Some(store) = &store {
            self.run.borrow_mut().context.set(store, Value::Bool(answer));
        }
        Ok(answer)
    }

    fn touch(&self, path: &str, options: Map) -> Result<()> {
        if !self.mode().performs_side_effects() {
            return Ok(());
        }
        let path = PathBuf::from(self.f(path));
        let content = options
            .get("content")
            .map(|v| self.f(&v.to_string()))
            .unwrap_or_default();
        self.write_output(
            path,
            content.as_bytes(),
            flag(&options, "overwrite"),
            Event::Touched,
        )
    }

    fn mkdir(&self, path: &str, options: Map) -> Result<()> {
        if !self.mode().performs_side_effects() {
            return Ok(());
        }
        let path = PathBuf::from(self.f(path));
        if path.is_dir() {
            return Ok(());
        }
        if path.exists() {
            return Err(EngineError::NotADirectory(path));
        }
        let created = if flag(&options, "parents") {
            std::fs::create_dir_all(&path)
        } else {
            std::fs::create_dir(&path)
        };
        created.map_err(|e| EngineError::io("create directory", &path, e))?;
        self.emit(Event::CreatedDir(path));
        Ok(())
    }

    fn f(&self, template: &str) -> String {
        self.run.borrow().context.interpolate(template)
    }

    fn reference(&self, path: &str) -> Option<Value> {
        self.run.borrow().context.get(path).cloned()
    }

    fn splice(&self, path: &str) -> Vec<Value> {
        to_list(self.run.borrow().context.get(path))
    }

    fn config(&self, name: &str) -> Result<()> {
        let Some(content) = self.fetch(name, ResourceKind::Template) else {
            return Ok(());
        };
        self.run.borrow_mut().config_template = Some(ConfigTemplate {
            name: name.to_string(),
            content: String::from_utf8_lossy(&content).into_owned(),
        });
        self.emit(Event::ConfigTemplate(name.to_string()));
        Ok(())
    }
}

fn flag(options: &Map, key: &str) -> bool {
    options.get(key).is_some_and(Value::is_truthy)
}

fn required(options: &Map, action: &'static str, key: &str) -> Result<String> {
    match options.get(key) {
        Some(value) if !value.to_string().is_empty() => Ok(value.to_string()),
        _ => Err(EngineError::invalid(action, format!("missing `{}`", key))),
    }
}

fn create_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .map_err(|e| EngineError::io("create directory", parent, e)),
        _ => Ok(()),
    }
}
