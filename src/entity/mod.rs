//! Entity catalogue: one static descriptor per managed collection.
//!
//! Everything generic in the app (list screens, forms, cache keys, commands)
//! is driven by these descriptors; adding an entity means adding a variant and
//! its descriptor here.

pub mod columns;
pub mod record;
pub mod schema;
pub mod search;

pub use columns::{Cell, Column, Lookups, Tone};
pub use record::Record;
pub use schema::{FieldErrors, FieldKind, FieldSpec, ValidationContext};
pub use search::filter_records;

/// A managed entity type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
  Users,
  Roles,
  Estados,
  Municipios,
  Parroquias,
  Comunidades,
  Ubicaciones,
  Personal,
  Centros,
  Eventos,
  Afluencia,
  Comunas,
  Proyectos,
  Consejos,
}

/// Static description of an entity's CRUD surface
#[derive(Debug)]
pub struct EntityDescriptor {
  /// REST collection name under `/api/`
  pub resource: &'static str,
  /// Plural title for list screens
  pub title: &'static str,
  pub singular: &'static str,
  /// Extra command names
  pub aliases: &'static [&'static str],
  /// Fields joined to build a record's display name
  pub display_fields: &'static [&'static str],
  pub fields: &'static [FieldSpec],
  pub columns: &'static [Column],
  pub search_fields: &'static [&'static str],
}

impl EntityKind {
  pub const ALL: &'static [EntityKind] = &[
    EntityKind::Users,
    EntityKind::Roles,
    EntityKind::Estados,
    EntityKind::Municipios,
    EntityKind::Parroquias,
    EntityKind::Comunidades,
    EntityKind::Ubicaciones,
    EntityKind::Personal,
    EntityKind::Centros,
    EntityKind::Eventos,
    EntityKind::Afluencia,
    EntityKind::Comunas,
    EntityKind::Proyectos,
    EntityKind::Consejos,
  ];

  pub fn descriptor(self) -> &'static EntityDescriptor {
    match self {
      EntityKind::Users => &USERS,
      EntityKind::Roles => &ROLES,
      EntityKind::Estados => &ESTADOS,
      EntityKind::Municipios => &MUNICIPIOS,
      EntityKind::Parroquias => &PARROQUIAS,
      EntityKind::Comunidades => &COMUNIDADES,
      EntityKind::Ubicaciones => &UBICACIONES,
      EntityKind::Personal => &PERSONAL,
      EntityKind::Centros => &CENTROS,
      EntityKind::Eventos => &EVENTOS,
      EntityKind::Afluencia => &AFLUENCIA,
      EntityKind::Comunas => &COMUNAS,
      EntityKind::Proyectos => &PROYECTOS,
      EntityKind::Consejos => &CONSEJOS,
    }
  }

  pub fn resource(self) -> &'static str {
    self.descriptor().resource
  }

  pub fn title(self) -> &'static str {
    self.descriptor().title
  }

  /// Look up an entity by its resource name or one of its aliases
  pub fn from_name(name: &str) -> Option<Self> {
    let name = name.trim().to_lowercase();
    EntityKind::ALL.iter().copied().find(|kind| {
      let d = kind.descriptor();
      d.resource == name || d.aliases.contains(&name.as_str())
    })
  }

  /// Parent collections referenced by form fields or table columns
  pub fn parents(self) -> Vec<EntityKind> {
    let d = self.descriptor();
    let mut parents: Vec<EntityKind> = d
      .fields
      .iter()
      .filter_map(FieldSpec::parent)
      .chain(d.columns.iter().filter_map(Column::parent))
      .collect();
    parents.sort();
    parents.dedup();
    parents
  }

  /// Entities holding a foreign key to this one, with the field that holds it
  pub fn children(self) -> Vec<(EntityKind, &'static str)> {
    EntityKind::ALL
      .iter()
      .copied()
      .filter_map(|child| {
        child
          .descriptor()
          .fields
          .iter()
          .find(|f| f.parent() == Some(self))
          .map(|f| (child, f.name))
      })
      .collect()
  }
}

const ID: Column = Column::text("ID", "id", 6);
const NOMBRE: FieldSpec = FieldSpec::text("nombre", "Nombre").required().max_len(120);
const CODIGO: FieldSpec = FieldSpec::text("codigo", "Código").required().max_len(20);

const PROYECTO_ESTATUS: &[&str] = &["planificado", "en_ejecucion", "culminado", "cancelado"];

static USERS: EntityDescriptor = EntityDescriptor {
  resource: "users",
  title: "Usuarios",
  singular: "Usuario",
  aliases: &["usuarios", "u", "user"],
  display_fields: &["username"],
  fields: &[
    FieldSpec::text("username", "Usuario")
      .required()
      .min_len(3)
      .max_len(50),
    FieldSpec::new("email", "Correo", FieldKind::Email).required(),
    FieldSpec::new("password", "Contraseña", FieldKind::Password)
      .required()
      .min_len(6),
    FieldSpec::text("nombre", "Nombre").max_len(120),
    FieldSpec::new("role_id", "Rol", FieldKind::ForeignKey(EntityKind::Roles)),
    FieldSpec::new("activo", "Activo", FieldKind::Bool),
  ],
  columns: &[
    ID,
    Column::text("Usuario", "username", 16),
    Column::text("Nombre", "nombre", 24),
    Column::text("Correo", "email", 28),
    Column::lookup("Rol", "role_id", EntityKind::Roles, 14),
    Column::badge("Activo", "activo", 7),
  ],
  search_fields: &["username", "nombre", "email"],
};

static ROLES: EntityDescriptor = EntityDescriptor {
  resource: "roles",
  title: "Roles",
  singular: "Rol",
  aliases: &["rol", "role"],
  display_fields: &["nombre"],
  fields: &[
    FieldSpec::text("nombre", "Nombre").required().max_len(50),
    FieldSpec::text("descripcion", "Descripción").max_len(255),
  ],
  columns: &[
    ID,
    Column::text("Nombre", "nombre", 20),
    Column::text("Descripción", "descripcion", 48),
  ],
  search_fields: &["nombre", "descripcion"],
};

static ESTADOS: EntityDescriptor = EntityDescriptor {
  resource: "estados",
  title: "Estados",
  singular: "Estado",
  aliases: &["estado", "e"],
  display_fields: &["nombre"],
  fields: &[NOMBRE, CODIGO],
  columns: &[
    ID,
    Column::text("Código", "codigo", 10),
    Column::text("Nombre", "nombre", 32),
  ],
  search_fields: &["nombre", "codigo"],
};

static MUNICIPIOS: EntityDescriptor = EntityDescriptor {
  resource: "municipios",
  title: "Municipios",
  singular: "Municipio",
  aliases: &["municipio", "m"],
  display_fields: &["nombre"],
  fields: &[
    NOMBRE,
    CODIGO,
    FieldSpec::new("estado_id", "Estado", FieldKind::ForeignKey(EntityKind::Estados)).required(),
  ],
  columns: &[
    ID,
    Column::text("Código", "codigo", 10),
    Column::text("Nombre", "nombre", 28),
    Column::lookup("Estado", "estado_id", EntityKind::Estados, 20),
  ],
  search_fields: &["nombre", "codigo"],
};

static PARROQUIAS: EntityDescriptor = EntityDescriptor {
  resource: "parroquias",
  title: "Parroquias",
  singular: "Parroquia",
  aliases: &["parroquia", "p"],
  display_fields: &["nombre"],
  fields: &[
    NOMBRE,
    CODIGO,
    FieldSpec::new(
      "municipio_id",
      "Municipio",
      FieldKind::ForeignKey(EntityKind::Municipios),
    )
    .required(),
  ],
  columns: &[
    ID,
    Column::text("Código", "codigo", 10),
    Column::text("Nombre", "nombre", 28),
    Column::lookup("Municipio", "municipio_id", EntityKind::Municipios, 20),
  ],
  search_fields: &["nombre", "codigo"],
};

static COMUNIDADES: EntityDescriptor = EntityDescriptor {
  resource: "comunidades",
  title: "Comunidades",
  singular: "Comunidad",
  aliases: &["comunidad"],
  display_fields: &["nombre"],
  fields: &[
    NOMBRE,
    FieldSpec::new(
      "parroquia_id",
      "Parroquia",
      FieldKind::ForeignKey(EntityKind::Parroquias),
    )
    .required(),
  ],
  columns: &[
    ID,
    Column::text("Nombre", "nombre", 32),
    Column::lookup("Parroquia", "parroquia_id", EntityKind::Parroquias, 24),
  ],
  search_fields: &["nombre"],
};

static UBICACIONES: EntityDescriptor = EntityDescriptor {
  resource: "ubicaciones",
  title: "Ubicaciones",
  singular: "Ubicación",
  aliases: &["ubicacion", "ubicación"],
  display_fields: &["nombre"],
  fields: &[
    NOMBRE,
    FieldSpec::text("direccion", "Dirección").max_len(255),
    FieldSpec::new("latitud", "Latitud", FieldKind::Decimal),
    FieldSpec::new("longitud", "Longitud", FieldKind::Decimal),
    FieldSpec::new(
      "comunidad_id",
      "Comunidad",
      FieldKind::ForeignKey(EntityKind::Comunidades),
    )
    .required(),
  ],
  columns: &[
    ID,
    Column::text("Nombre", "nombre", 24),
    Column::text("Dirección", "direccion", 28),
    Column::text("Lat", "latitud", 10),
    Column::text("Lon", "longitud", 10),
    Column::lookup("Comunidad", "comunidad_id", EntityKind::Comunidades, 20),
  ],
  search_fields: &["nombre", "direccion"],
};

static PERSONAL: EntityDescriptor = EntityDescriptor {
  resource: "personal",
  title: "Personal",
  singular: "Persona",
  aliases: &["persona", "staff"],
  display_fields: &["nombre", "apellido"],
  fields: &[
    FieldSpec::text("cedula", "Cédula")
      .required()
      .min_len(6)
      .max_len(12),
    FieldSpec::text("nombre", "Nombre").required().max_len(60),
    FieldSpec::text("apellido", "Apellido").required().max_len(60),
    FieldSpec::text("telefono", "Teléfono").max_len(20),
    FieldSpec::text("cargo", "Cargo").max_len(60),
    FieldSpec::new("centro_id", "Centro", FieldKind::ForeignKey(EntityKind::Centros)),
  ],
  columns: &[
    ID,
    Column::text("Cédula", "cedula", 12),
    Column::text("Nombre", "nombre", 16),
    Column::text("Apellido", "apellido", 16),
    Column::text("Cargo", "cargo", 16),
    Column::lookup("Centro", "centro_id", EntityKind::Centros, 24),
  ],
  search_fields: &["cedula", "nombre", "apellido", "cargo"],
};

static CENTROS: EntityDescriptor = EntityDescriptor {
  resource: "centros",
  title: "Centros de votación",
  singular: "Centro",
  aliases: &["centro", "c"],
  display_fields: &["nombre"],
  fields: &[
    CODIGO,
    NOMBRE,
    FieldSpec::text("direccion", "Dirección").max_len(255),
    FieldSpec::new("electores", "Electores", FieldKind::Integer),
    FieldSpec::new("mesas", "Mesas", FieldKind::Integer),
    FieldSpec::new(
      "parroquia_id",
      "Parroquia",
      FieldKind::ForeignKey(EntityKind::Parroquias),
    )
    .required(),
  ],
  columns: &[
    ID,
    Column::text("Código", "codigo", 12),
    Column::text("Nombre", "nombre", 30),
    Column::text("Electores", "electores", 10),
    Column::text("Mesas", "mesas", 6),
    Column::lookup("Parroquia", "parroquia_id", EntityKind::Parroquias, 20),
  ],
  search_fields: &["codigo", "nombre", "direccion"],
};

static EVENTOS: EntityDescriptor = EntityDescriptor {
  resource: "eventos",
  title: "Eventos",
  singular: "Evento",
  aliases: &["evento"],
  display_fields: &["nombre"],
  fields: &[
    NOMBRE,
    FieldSpec::new("fecha", "Fecha", FieldKind::Date).required(),
    FieldSpec::text("descripcion", "Descripción").max_len(255),
    FieldSpec::new("activo", "Activo", FieldKind::Bool),
  ],
  columns: &[
    ID,
    Column::text("Nombre", "nombre", 30),
    Column::date("Fecha", "fecha", 12),
    Column::badge("Activo", "activo", 7),
  ],
  search_fields: &["nombre", "descripcion"],
};

static AFLUENCIA: EntityDescriptor = EntityDescriptor {
  resource: "afluencia",
  title: "Afluencia",
  singular: "Registro de afluencia",
  aliases: &["turnout"],
  display_fields: &["fecha", "hora"],
  fields: &[
    FieldSpec::new("fecha", "Fecha", FieldKind::Date).required(),
    FieldSpec::new("hora", "Hora", FieldKind::Time).required(),
    FieldSpec::new("votantes", "Votantes", FieldKind::Integer).required(),
    FieldSpec::new("centro_id", "Centro", FieldKind::ForeignKey(EntityKind::Centros)).required(),
  ],
  columns: &[
    ID,
    Column::lookup("Centro", "centro_id", EntityKind::Centros, 28),
    Column::date("Fecha", "fecha", 12),
    Column::text("Hora", "hora", 8),
    Column::text("Votantes", "votantes", 10),
  ],
  search_fields: &["fecha", "hora"],
};

static COMUNAS: EntityDescriptor = EntityDescriptor {
  resource: "comunas",
  title: "Comunas",
  singular: "Comuna",
  aliases: &["comuna"],
  display_fields: &["nombre"],
  fields: &[
    NOMBRE,
    CODIGO,
    FieldSpec::new(
      "parroquia_id",
      "Parroquia",
      FieldKind::ForeignKey(EntityKind::Parroquias),
    )
    .required(),
  ],
  columns: &[
    ID,
    Column::text("Código", "codigo", 12),
    Column::text("Nombre", "nombre", 30),
    Column::lookup("Parroquia", "parroquia_id", EntityKind::Parroquias, 20),
    Column::date("Creada", "created_at", 12),
  ],
  search_fields: &["nombre", "codigo"],
};

static PROYECTOS: EntityDescriptor = EntityDescriptor {
  resource: "proyectos",
  title: "Proyectos",
  singular: "Proyecto",
  aliases: &["proyecto"],
  display_fields: &["nombre"],
  fields: &[
    NOMBRE,
    FieldSpec::text("descripcion", "Descripción").max_len(500),
    FieldSpec::new("estatus", "Estatus", FieldKind::Choice(PROYECTO_ESTATUS)).required(),
    FieldSpec::new("monto", "Monto", FieldKind::Decimal),
    FieldSpec::new("comuna_id", "Comuna", FieldKind::ForeignKey(EntityKind::Comunas)).required(),
  ],
  columns: &[
    ID,
    Column::text("Nombre", "nombre", 28),
    Column::badge("Estatus", "estatus", 14),
    Column::text("Monto", "monto", 12),
    Column::lookup("Comuna", "comuna_id", EntityKind::Comunas, 20),
  ],
  search_fields: &["nombre", "descripcion", "estatus"],
};

static CONSEJOS: EntityDescriptor = EntityDescriptor {
  resource: "consejos",
  title: "Consejos comunales",
  singular: "Consejo comunal",
  aliases: &["consejo"],
  display_fields: &["nombre"],
  fields: &[
    NOMBRE,
    CODIGO,
    FieldSpec::new("comuna_id", "Comuna", FieldKind::ForeignKey(EntityKind::Comunas)).required(),
  ],
  columns: &[
    ID,
    Column::text("Código", "codigo", 12),
    Column::text("Nombre", "nombre", 30),
    Column::lookup("Comuna", "comuna_id", EntityKind::Comunas, 20),
  ],
  search_fields: &["nombre", "codigo"],
};

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_resources_are_unique() {
    let mut names: Vec<&str> = EntityKind::ALL.iter().map(|k| k.resource()).collect();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), EntityKind::ALL.len());
  }

  #[test]
  fn test_from_name_matches_resource_and_alias() {
    assert_eq!(EntityKind::from_name("municipios"), Some(EntityKind::Municipios));
    assert_eq!(EntityKind::from_name(" Parroquia "), Some(EntityKind::Parroquias));
    assert_eq!(EntityKind::from_name("mapa"), None);
  }

  #[test]
  fn test_parents_form_a_shallow_tree() {
    assert_eq!(EntityKind::Estados.parents(), vec![]);
    assert_eq!(EntityKind::Municipios.parents(), vec![EntityKind::Estados]);
    assert_eq!(EntityKind::Proyectos.parents(), vec![EntityKind::Comunas]);

    for kind in EntityKind::ALL {
      assert!(kind.parents().len() <= 1, "{:?} has several parents", kind);
      assert!(!kind.parents().contains(kind));
    }
  }

  #[test]
  fn test_children_mirror_parents() {
    assert_eq!(
      EntityKind::Parroquias.children(),
      vec![
        (EntityKind::Comunidades, "parroquia_id"),
        (EntityKind::Centros, "parroquia_id"),
        (EntityKind::Comunas, "parroquia_id"),
      ]
    );
    assert!(EntityKind::Eventos.children().is_empty());

    for kind in EntityKind::ALL {
      for (child, _) in kind.children() {
        assert!(child.parents().contains(kind));
      }
    }
  }

  #[test]
  fn test_every_entity_is_searchable_and_has_id_column() {
    for kind in EntityKind::ALL {
      let d = kind.descriptor();
      assert!(!d.search_fields.is_empty());
      assert!(!d.display_fields.is_empty());
      assert_eq!(d.columns[0], ID);
      assert!(d.fields.iter().all(|f| f.name != "id"));
    }
  }
}
