//! Project initialization command

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use heck::{ToKebabCase, ToUpperCamelCase};

use crate::config::CONFIG_FILE;

/// Initialize a new library project
#[derive(Args, Debug)]
pub struct InitCommand {
    /// Project name / directory
    #[arg(default_value = ".")]
    pub name: String,

    /// Project template
    #[arg(short, long, default_value = "vue", value_parser = ["vue", "vanilla"])]
    pub template: String,

    /// Name of the generated component (vue template)
    #[arg(long, default_value = "Pagination")]
    pub component: String,
}

impl InitCommand {
    pub async fn execute(&self) -> Result<()> {
        let project_dir = Path::new(&self.name);

        eprintln!(
            "{} Initializing new {} library...\n",
            "→".blue(),
            self.template.cyan()
        );

        if self.name != "." {
            fs::create_dir_all(project_dir).context("Failed to create project directory")?;
        }

        let config_path = project_dir.join(CONFIG_FILE);
        if config_path.exists() {
            anyhow::bail!("{} already exists", config_path.display());
        }

        self.write(project_dir, CONFIG_FILE, &self.generate_config())?;

        let src_dir = project_dir.join("src");
        fs::create_dir_all(&src_dir).context("Failed to create src directory")?;
        match self.template.as_str() {
            "vue" => {
                let components = src_dir.join("components");
                fs::create_dir_all(&components).context("Failed to create src/components")?;
                self.write(
                    project_dir,
                    &format!("src/components/{}.vue", self.component_name()),
                    PAGINATION_COMPONENT,
                )?;
                self.write(project_dir, "src/index.ts", &self.generate_vue_index())?;
            }
            _ => self.write(project_dir, "src/index.ts", VANILLA_INDEX)?,
        }

        self.write(project_dir, "package.json", &self.generate_package_json()?)?;

        eprintln!("\n{} Library initialized successfully!\n", "✓".green().bold());
        eprintln!("  Next steps:");
        if self.name != "." {
            eprintln!("    {} cd {}", "→".dimmed(), self.name.cyan());
        }
        eprintln!("    {} libpack build", "→".dimmed());
        eprintln!();

        Ok(())
    }

    fn write(&self, project_dir: &Path, relative: &str, content: &str) -> Result<()> {
        fs::write(project_dir.join(relative), content)
            .with_context(|| format!("Failed to write {}", relative))?;
        eprintln!("  {} Created {}", "✓".green(), relative.cyan());
        Ok(())
    }

    fn project_name(&self) -> String {
        let name = if self.name == "." {
            std::env::current_dir()
                .ok()
                .and_then(|dir| dir.file_name().map(|n| n.to_string_lossy().into_owned()))
                .unwrap_or_default()
        } else {
            Path::new(&self.name)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        };

        match name.to_kebab_case() {
            kebab if kebab.is_empty() => "my-library".to_string(),
            kebab => kebab,
        }
    }

    fn component_name(&self) -> String {
        self.component.to_upper_camel_case()
    }

    fn generate_config(&self) -> String {
        let library = self.project_name().to_upper_camel_case();

        let (bundle, plugins) = match self.template.as_str() {
            "vue" => (
                r#"[bundle]
external = ["vue"]

[bundle.globals]
vue = "Vue"
"#,
                r#"[[plugins]]
name = "vue"

[[plugins]]
name = "typescript"
options = { include = ["src/**/*.ts", "src/**/*.vue"], declaration = true, declaration_map = true }
"#,
            ),
            _ => (
                "",
                r#"[[plugins]]
name = "typescript"
options = { include = ["src/**/*.ts"], declaration = true }
"#,
            ),
        };

        format!(
            r#"# libpack configuration

[library]
entry = "src/index.ts"
name = "{library}"
file_name = "[name].[format].js"
formats = ["es", "umd"]

[build]
out_dir = "dist"
sourcemap = true

{bundle}
{plugins}"#,
            library = library,
            bundle = bundle,
            plugins = plugins,
        )
    }

    fn generate_vue_index(&self) -> String {
        let component = self.component_name();
        format!(
            "import {c} from './components/{c}.vue'\n\nexport {{ {c} }}\nexport default {c}\n",
            c = component
        )
    }

    fn generate_package_json(&self) -> Result<String> {
        let name = self.project_name();
        let mut package = serde_json::json!({
            "name": name,
            "version": "0.1.0",
            "type": "module",
            "main": format!("./dist/{}.umd.js", name),
            "module": format!("./dist/{}.es.js", name),
            "types": "./dist/index.d.ts",
            "files": ["dist"],
            "scripts": {
                "build": "libpack build",
                "watch": "libpack build --watch"
            }
        });

        if self.template == "vue" {
            package["peerDependencies"] = serde_json::json!({ "vue": "^3.3.0" });
        }

        let mut json = serde_json::to_string_pretty(&package)?;
        json.push('\n');
        Ok(json)
    }
}

const PAGINATION_COMPONENT: &str = r#"<template>
  <nav class="pagination" aria-label="pagination">
    <button class="pagination-prev" :disabled="modelValue <= 1" @click="select(modelValue - 1)">
      {{ prevText }}
    </button>
    <button
      v-for="page in pages"
      :key="page"
      class="pagination-page"
      :class="{ active: page === modelValue }"
      @click="select(page)"
    >
      {{ page }}
    </button>
    <button class="pagination-next" :disabled="modelValue >= pageCount" @click="select(modelValue + 1)">
      {{ nextText }}
    </button>
  </nav>
</template>

<script setup lang="ts">
import { computed } from 'vue'

const props = defineProps({
  modelValue: { type: Number, default: 1 },
  pageCount: { type: Number, required: true },
  prevText: { type: String, default: 'Prev' },
  nextText: { type: String, default: 'Next' },
})

const emit = defineEmits(['update:modelValue', 'change'])

const pages = computed(() => Array.from({ length: props.pageCount }, (_, i) => i + 1))

function select(page: number): void {
  if (page < 1 || page > props.pageCount || page === props.modelValue) {
    return
  }
  emit('update:modelValue', page)
  emit('change', page)
}
</script>

<style>
.pagination {
  display: flex;
  gap: 0.25rem;
}

.pagination-page.active {
  font-weight: bold;
}
</style>
"#;

const VANILLA_INDEX: &str = r#"export interface PageRange {
  first: number
  last: number
}

export function pageRange(current: number, pageCount: number, size = 5): PageRange {
  const half = Math.floor(size / 2)
  const first = Math.max(1, Math.min(current - half, pageCount - size + 1))
  return { first, last: Math.min(pageCount, first + size - 1) }
}
"#;
