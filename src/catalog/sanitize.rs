use super::{Cart, NewProduct, NewVendor, ProfileUpdate};

/// Strip markup from free text before it is persisted.
pub fn clean_text(input: &str) -> String {
    ammonia::clean(input).trim().to_string()
}

/// Post-decode pass applied to every inbound model.
pub trait Sanitize {
    fn sanitize(self) -> Self;
}

impl Sanitize for ProfileUpdate {
    fn sanitize(self) -> Self {
        ProfileUpdate {
            display_name: clean_text(&self.display_name),
            phone: clean_text(&self.phone),
            address: clean_text(&self.address),
        }
    }
}

impl Sanitize for NewVendor {
    fn sanitize(self) -> Self {
        NewVendor {
            name: clean_text(&self.name),
            description: clean_text(&self.description),
            address: clean_text(&self.address),
        }
    }
}

impl Sanitize for NewProduct {
    fn sanitize(self) -> Self {
        NewProduct { name: clean_text(&self.name), description: clean_text(&self.description), ..self }
    }
}

// numeric only
impl Sanitize for Cart {
    fn sanitize(self) -> Self { self }
}
