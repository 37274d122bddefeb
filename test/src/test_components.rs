use serde::{Deserialize, Serialize};
use serde_json::json;

use tether_server::{
    shared::Scope, Component, ComponentDescriptor, ComponentError, Event, ViewContext,
};
use tether_shared::html::{escape_attribute, escape_text};

/// Published globally whenever a valid profile is saved
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Saved {
    pub saves: u32,
}

impl Event for Saved {
    const NAME: &'static str = "Saved";
}

/// Sent by an avatar to the profile it is nested in
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pinged {
    pub from: String,
}

impl Event for Pinged {
    const NAME: &'static str = "Pinged";
}

/// Profile form with two required fields and a nested [`Avatar`]
#[derive(Default)]
pub struct Profile {
    pub name: String,
    pub email: String,
    pub subscribed: bool,
    pub saves: u32,
    pub pings: u32,
}

impl Component for Profile {
    const NAME: &'static str = "profile";

    fn describe(descriptor: &mut ComponentDescriptor<Self>) {
        descriptor
            .state("name", |p| &p.name, |p| &mut p.name)
            .state("email", |p| &p.email, |p| &mut p.email)
            .state("subscribed", |p| &p.subscribed, |p| &mut p.subscribed)
            .state("saves", |p| &p.saves, |p| &mut p.saves)
            .state("pings", |p| &p.pings, |p| &mut p.pings)
            .rule("name", "Name is required", |p| !p.name.trim().is_empty())
            .rule("email", "Email is invalid", |p| p.email.contains('@'))
            .subscribe::<Pinged, _>(|profile, _, _| {
                profile.pings += 1;
                Ok(())
            });

        descriptor.action("Save", &[], |profile, ctx, _| {
            if ctx.validate(&*profile)? {
                profile.saves += 1;
                ctx.dispatch_global(
                    Saved {
                        saves: profile.saves,
                    },
                    None,
                )?;
            }
            Ok(())
        });
        descriptor.action("Rename", &["name"], |profile, _, args| {
            profile.name = args.get::<String>("name")?;
            Ok(())
        });
        descriptor.action("Announce", &[], |profile, ctx, _| {
            ctx.dispatch(
                Saved {
                    saves: profile.saves,
                },
                Scope::Parent,
            )
        });
    }

    fn view(&self, view: &mut ViewContext<'_>) -> Result<String, ComponentError> {
        let avatar = view.component::<Avatar>(Some("avatar"), json!({ "label": self.name }))?;
        let name_errors = view.errors_for("name").collect::<Vec<_>>().join(", ");
        let email_errors = view.errors_for("email").collect::<Vec<_>>().join(", ");
        Ok(format!(
            "<form>\
             <input name=\"name\" value=\"{}\"><span class=\"name-error\">{}</span>\
             <input name=\"email\" value=\"{}\"><span class=\"email-error\">{}</span>\
             <input name=\"subscribed\" type=\"checkbox\"{}>\
             <span class=\"saves\">{}</span><span class=\"pings\">{}</span>\
             {avatar}\
             </form>",
            escape_attribute(&self.name),
            escape_text(&name_errors),
            escape_attribute(&self.email),
            escape_text(&email_errors),
            if self.subscribed { " checked" } else { "" },
            self.saves,
            self.pings,
        ))
    }
}

/// Nested in [`Profile`], keeps count of the saves it heard about
#[derive(Default)]
pub struct Avatar {
    pub label: String,
    pub saves: u32,
}

impl Component for Avatar {
    const NAME: &'static str = "avatar";

    fn describe(descriptor: &mut ComponentDescriptor<Self>) {
        descriptor
            .state("label", |a| &a.label, |a| &mut a.label)
            .state("saves", |a| &a.saves, |a| &mut a.saves)
            .subscribe::<Saved, _>(|avatar, _, saved| {
                avatar.saves = saved.saves;
                Ok(())
            });

        descriptor.action("Ping", &[], |_, ctx, _| {
            ctx.dispatch(
                Pinged {
                    from: Self::NAME.to_string(),
                },
                Scope::Parent,
            )
        });
    }

    fn view(&self, _view: &mut ViewContext<'_>) -> Result<String, ComponentError> {
        Ok(format!(
            "<div class=\"avatar\"><span class=\"label\">{}</span>\
             <span class=\"avatar-saves\">{}</span>\
             <button class=\"ping\" tether-action=\"Ping\">Ping</button></div>",
            escape_text(&self.label),
            self.saves,
        ))
    }
}
