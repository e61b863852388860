// ====================================================================================
// src/panel.rs - 面板渲染
// ====================================================================================
use crate::{
    config::Config,
    models::{ActionRow, Embed, EmbedField, EmbedFooter, EmbedImage, LinkButton, PanelPayload, PendingUpdate},
};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

// Discord 不接受空字段名
const BLANK_FIELD_NAME: &str = "\u{200b}";

#[derive(Clone, Debug)]
pub struct PanelRenderer {
    description: String,
    thumbnail_url: Option<String>,
    room_link: Option<String>,
    vip_link: Option<String>,
    timezone: Tz,
}

impl PanelRenderer {
    pub fn from_config(config: &Config) -> Self {
        Self {
            description: config.panel_description.clone(),
            thumbnail_url: config.panel_thumbnail_url.clone(),
            room_link: config.room_link.clone(),
            vip_link: config.vip_link.clone(),
            timezone: config.panel_timezone,
        }
    }

    pub fn render(&self, pending: &PendingUpdate, now: DateTime<Utc>) -> PanelPayload {
        let mut fields = vec![EmbedField {
            name: BLANK_FIELD_NAME.to_string(),
            value: format!("```fix\n🎮 {} Usuários no quarto\n```", pending.user_count),
            inline: false,
        }];
        if let Some(link) = &self.room_link {
            fields.push(EmbedField {
                name: BLANK_FIELD_NAME.to_string(),
                value: format!("```fix\n{}```", link),
                inline: true,
            });
        }

        let embed = Embed {
            title: pending.room_name.to_uppercase(),
            description: self.description.clone(),
            thumbnail: self.thumbnail_url.clone().map(|url| EmbedImage { url }),
            fields,
            footer: EmbedFooter {
                text: format!(
                    "🕔{}",
                    now.with_timezone(&self.timezone).format("%d/%m/%Y - %H:%M")
                ),
            },
        };

        let mut buttons = Vec::new();
        if let Some(link) = &self.room_link {
            buttons.push(LinkButton::new("QUARTO", link.clone()));
        }
        if let Some(link) = &self.vip_link {
            buttons.push(LinkButton::new("💎 VIP", link.clone()));
        }
        let components = if buttons.is_empty() {
            Vec::new()
        } else {
            vec![ActionRow::of_links(buttons)]
        };

        PanelPayload { embeds: vec![embed], components }
    }
}

impl Default for PanelRenderer {
    fn default() -> Self {
        Self {
            description: "Chame seus amigos e vem jogar!".to_string(),
            thumbnail_url: None,
            room_link: None,
            vip_link: None,
            timezone: chrono_tz::America::Sao_Paulo,
        }
    }
}
