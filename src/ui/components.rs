/// Reusable UI components

use yew::prelude::*;

use crate::enrichment::{EnrichmentOutcome, Summary};
use crate::tab_data::{GroupOutcome, GroupResult, TabId};

/// Map a Chrome group color name to a swatch
fn swatch(color: &str) -> &'static str {
    match color {
        "blue" => "#1a73e8",
        "red" => "#d93025",
        "yellow" => "#f9ab00",
        "green" => "#188038",
        "pink" => "#d01884",
        "purple" => "#a142f4",
        "cyan" => "#007b83",
        "orange" => "#fa903e",
        _ => "#5f6368",
    }
}

#[derive(Properties, PartialEq)]
pub struct ProgressBarProps {
    pub progress: u8, // 0-100
    #[prop_or_default]
    pub label: Option<String>,
}

#[function_component(ProgressBar)]
pub fn progress_bar(props: &ProgressBarProps) -> Html {
    let progress = props.progress.min(100);
    let text = props
        .label
        .clone()
        .unwrap_or_else(|| format!("{}%", progress));

    html! {
        <div class="progress-container">
            <div style={format!("width: {}%; background-color: #5B4FE8; height: 100%; transition: width 0.3s ease; display: flex; align-items: center; justify-content: center; color: white; font-size: 12px; font-weight: bold;", progress)}>
                {text}
            </div>
        </div>
    }
}

#[derive(Properties, PartialEq)]
pub struct GroupCardProps {
    pub result: GroupResult,
    #[prop_or_default]
    pub enrichment: Option<EnrichmentOutcome>,
    #[prop_or_default]
    pub pending_enrichment: bool,
    pub onfocus: Callback<TabId>,
}

#[function_component(GroupCard)]
pub fn group_card(props: &GroupCardProps) -> Html {
    match &props.result.outcome {
        GroupOutcome::Failed { error } => html! {
            <div class="group-card group-card-failed" style="border-left: 4px solid #f44336; padding: 8px 12px; margin: 6px 0;">
                <strong>{&props.result.label}</strong>
                <p class="message-paragraph">{error}</p>
            </div>
        },
        GroupOutcome::Grouped { tab_ids, color, .. } => {
            let first_tab = tab_ids.first().copied();
            let onclick = {
                let onfocus = props.onfocus.clone();
                Callback::from(move |_: MouseEvent| {
                    if let Some(id) = first_tab {
                        onfocus.emit(id);
                    }
                })
            };

            html! {
                <div class="group-card" onclick={onclick}
                    style={format!("border-left: 4px solid {}; padding: 8px 12px; margin: 6px 0; cursor: pointer;", swatch(color))}>
                    <div class="group-card-header">
                        <strong>{&props.result.label}</strong>
                        <span class="stat-count">{format!("{} tabs", tab_ids.len())}</span>
                    </div>
                    if let Some(enrichment) = &props.enrichment {
                        if let Some(overview) = &enrichment.overview {
                            <p class="group-overview">{overview}</p>
                        }
                        {match &enrichment.summary {
                            Summary::Available(text) => html! { <p class="group-summary">{text}</p> },
                            Summary::Unavailable => html! { <p class="group-summary-missing">{"Summary unavailable"}</p> },
                        }}
                    } else if props.pending_enrichment {
                        <p class="loading-text">{"Summarizing..."}</p>
                    }
                </div>
            }
        }
    }
}

#[derive(Properties, PartialEq)]
pub struct RunLogProps {
    pub lines: Vec<String>,
}

#[function_component(RunLog)]
pub fn run_log(props: &RunLogProps) -> Html {
    if props.lines.is_empty() {
        return html! {};
    }

    html! {
        <div class="run-log" style="max-height: 120px; overflow-y: auto; font-size: 11px; color: #555; margin-top: 10px;">
            {for props.lines.iter().map(|line| html! { <div>{line}</div> })}
        </div>
    }
}
