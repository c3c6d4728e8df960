//! Ergonomic builder for the agent card served at the well-known
//! discovery endpoint.

use crate::types::{AgentCapabilities, AgentCard, AgentSkill};

#[derive(Debug, Clone)]
pub struct AgentCardBuilder {
    name: String,
    description: Option<String>,
    version: String,
    url: String,
    streaming: bool,
    skills: Vec<AgentSkill>,
}

impl AgentCardBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        AgentCardBuilder {
            name: name.into(),
            description: None,
            version: "0.1.0".to_string(),
            url: String::new(),
            streaming: false,
            skills: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn skill(
        mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        description: Option<String>,
        tags: Vec<String>,
    ) -> Self {
        self.skills.push(AgentSkill {
            id: id.into(),
            name: name.into(),
            description,
            tags,
        });
        self
    }

    pub fn build(self) -> Result<AgentCard, String> {
        if self.url.is_empty() {
            return Err("agent card requires a url (set via .url(..))".to_string());
        }
        Ok(AgentCard {
            name: self.name,
            description: self.description,
            url: self.url,
            version: self.version,
            capabilities: AgentCapabilities {
                streaming: self.streaming,
            },
            skills: self.skills,
        })
    }
}
